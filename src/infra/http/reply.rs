//! Parsers for project server replies.
//!
//! Replies are walked with `quick-xml`. Element paths are tracked relative to the
//! document root, so `<scheduler_reply><workunit><name>` is seen as `workunit>name`.
//! Text is delivered when an element closes; empty elements carry no text.

use quick_xml::events::{BytesStart, Event as XmlEvent};
use quick_xml::Reader;
use tracing::{debug, info, warn};

use crate::core::{ClientError, ClientResult, ErrorCode, FileInfo, Manifest};

fn parse_error(e: impl std::fmt::Display) -> ClientError {
    ClientError::error(ErrorCode::Server, format!("malformed server reply: {e}"))
}

/// One step of a document walk.
enum Node<'a> {
    /// An element starts; carries its relative path and start tag.
    Open(&'a str, &'a BytesStart<'a>),
    /// An element ends; carries its relative path and trimmed text.
    Close(&'a str, &'a str),
}

/// Path-tracking walk over a document. The root element itself is not visited.
fn walk<V>(xml: &str, mut visit: V) -> ClientResult<()>
where
    V: FnMut(Node<'_>) -> ClientResult<()>,
{
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut text = String::new();
    loop {
        match reader.read_event().map_err(parse_error)? {
            XmlEvent::Start(start) => {
                stack.push(String::from_utf8_lossy(start.local_name().as_ref()).into_owned());
                text.clear();
                let path = relative_path(&stack);
                if !path.is_empty() {
                    visit(Node::Open(&path, &start))?;
                }
            }
            XmlEvent::Empty(start) => {
                stack.push(String::from_utf8_lossy(start.local_name().as_ref()).into_owned());
                let path = relative_path(&stack);
                if !path.is_empty() {
                    visit(Node::Open(&path, &start))?;
                    visit(Node::Close(&path, ""))?;
                }
                stack.pop();
                text.clear();
            }
            XmlEvent::Text(t) => text.push_str(&t.unescape().map_err(parse_error)?),
            XmlEvent::CData(c) => text.push_str(&String::from_utf8_lossy(&c.into_inner())),
            XmlEvent::End(_) => {
                let path = relative_path(&stack);
                if !path.is_empty() {
                    visit(Node::Close(&path, text.trim()))?;
                }
                stack.pop();
                text.clear();
            }
            XmlEvent::Eof => break,
            _ => {}
        }
    }
    Ok(())
}

/// Visit only closing elements.
fn walk_text<V>(xml: &str, mut visit: V) -> ClientResult<()>
where
    V: FnMut(&str, &str),
{
    walk(xml, |node| {
        if let Node::Close(path, text) = node {
            visit(path, text);
        }
        Ok(())
    })
}

fn relative_path(stack: &[String]) -> String {
    stack.get(1..).map_or_else(String::new, |rest| rest.join(">"))
}

fn attribute(start: &BytesStart<'_>, name: &str) -> Option<String> {
    start
        .attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name.as_bytes())
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

fn number<T: std::str::FromStr + Default>(text: &str) -> T {
    text.trim().parse().unwrap_or_default()
}

/// Which list a `<file_ref>` belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefContext {
    App,
    WorkUnit,
    Result,
}

#[derive(Debug, Default)]
struct FileRef {
    file_name: String,
    open_name: Option<String>,
    main_program: bool,
}

/// Parsed scheduler reply.
#[derive(Debug, Clone, Default)]
pub struct SchedulerReply {
    /// The assignment, possibly empty.
    pub manifest: Manifest,
    /// Seconds the server asks the client to wait before the next request.
    pub request_delay: Option<u64>,
    /// Prioritised server messages, as `(priority, text)`.
    pub messages: Vec<(String, String)>,
}

impl SchedulerReply {
    /// The manifest, or a server error when the reply holds no files.
    pub fn into_manifest(self) -> ClientResult<Manifest> {
        if !self.manifest.arena.is_empty() {
            return Ok(self.manifest);
        }
        Err(match self.request_delay {
            Some(delay) if delay > 0 => {
                ClientError::delayed(ErrorCode::Server, "Empty work unit", delay)
            }
            _ => ClientError::error(ErrorCode::Server, "Empty work unit"),
        })
    }
}

fn apply_file_field(file: &mut FileInfo, path: &str, text: &str) {
    match path {
        "file_info>name" => file.name = text.to_string(),
        // First URL wins; later ones are mirrors.
        "file_info>url" if file.url.is_none() => file.url = Some(text.to_string()),
        "file_info>executable" => file.flags.executable = true,
        "file_info>generated_locally" => file.flags.generated_locally = true,
        "file_info>upload_when_present" => file.flags.upload = true,
        "file_info>file_signature" => file.signature = Some(text.to_string()),
        "file_info>xml_signature" => file.xml_signature = Some(text.to_string()),
        "file_info>nbytes" => file.nbytes = number::<f64>(text) as u64,
        "file_info>max_nbytes" => file.max_nbytes = number::<f64>(text) as u64,
        "file_info>md5_cksum" => file.checksum = Some(text.to_string()),
        _ => {}
    }
}

/// Parse a `<scheduler_reply>` document.
pub fn parse_scheduler_reply(xml: &str) -> ClientResult<SchedulerReply> {
    let mut reply = SchedulerReply::default();
    let mut current_file: Option<FileInfo> = None;
    let mut current_ref: Option<FileRef> = None;
    let mut refs: Vec<(RefContext, FileRef)> = Vec::new();
    let mut message_priority: Option<String> = None;

    let manifest = &mut reply.manifest;
    let request_delay = &mut reply.request_delay;
    let messages = &mut reply.messages;

    walk(xml, |node| {
        match node {
            Node::Open(path, start) => match path {
                "file_info" => current_file = Some(FileInfo::default()),
                "app_version>file_ref" | "workunit>file_ref" | "result>file_ref" => {
                    current_ref = Some(FileRef::default());
                }
                "message" => message_priority = attribute(start, "priority"),
                _ => {}
            },
            Node::Close(path, text) => {
                if let Some(file) = current_file.as_mut() {
                    apply_file_field(file, path, text);
                }
                if let Some(file_ref) = current_ref.as_mut() {
                    if path.ends_with("file_ref>file_name") {
                        file_ref.file_name = text.to_string();
                    } else if path.ends_with("file_ref>open_name") && !text.is_empty() {
                        file_ref.open_name = Some(text.to_string());
                    } else if path.ends_with("file_ref>main_program") {
                        file_ref.main_program = true;
                    }
                }
                match path {
                    "file_info" => {
                        if let Some(file) = current_file.take() {
                            debug!("file info {}", file.name);
                            manifest.arena.insert(file);
                        }
                    }
                    "app_version>file_ref" | "workunit>file_ref" | "result>file_ref" => {
                        let context = match path {
                            "app_version>file_ref" => RefContext::App,
                            "workunit>file_ref" => RefContext::WorkUnit,
                            _ => RefContext::Result,
                        };
                        if let Some(file_ref) = current_ref.take() {
                            refs.push((context, file_ref));
                        }
                    }
                    "request_delay" => *request_delay = Some(number::<f64>(text).ceil() as u64),
                    "message" => {
                        let priority = message_priority.take().unwrap_or_default();
                        if priority == "high" {
                            warn!("server message: {}", text);
                        } else {
                            info!("server message: {}", text);
                        }
                        messages.push((priority, text.to_string()));
                    }
                    "workunit>name" => {
                        if manifest.name.is_none() {
                            manifest.name = Some(text.to_string());
                        }
                    }
                    "workunit>rsc_fpops_est" => manifest.estimated_flops = number(text),
                    "workunit>rsc_disk_bound" => manifest.estimated_disk = number(text),
                    "workunit>rsc_memory_bound" => manifest.estimated_memory = number(text),
                    "app>name" | "app_version>app_name" => {
                        manifest.app.name = Some(text.to_string());
                    }
                    "app_version>version_num" => manifest.app.version = Some(text.to_string()),
                    "app_version>api_version" => {
                        manifest.app.api_version = Some(text.to_string());
                    }
                    "result>name" => {
                        if manifest.result.name.is_none() {
                            manifest.result.name = Some(text.to_string());
                        }
                    }
                    "result>report_deadline" => {
                        manifest.result.deadline = number::<f64>(text) as u64;
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    })?;

    for (context, file_ref) in refs {
        let id = manifest.arena.require(&file_ref.file_name)?;
        if let Some(file) = manifest.arena.get_mut(id) {
            if file.open_name.is_none() {
                file.open_name = file_ref.open_name;
            }
            if file_ref.main_program {
                file.flags.main_program = true;
            }
        }
        match context {
            RefContext::App => manifest.app.files.push(id),
            RefContext::WorkUnit => manifest.files.push(id),
            RefContext::Result => manifest.result.files.push(id),
        }
    }
    if let Some((_, file)) = manifest.arena.iter().find(|(_, f)| !f.has_plain_names()) {
        return Err(ClientError::error(
            ErrorCode::Server,
            format!("refusing file {:?} opened as {:?}", file.name, file.disk_name()),
        ));
    }
    Ok(reply)
}

/// Account lookup reply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthReply {
    /// Authenticator handed out by the server.
    pub authenticator: Option<String>,
    /// Error message, when the lookup failed.
    pub error: Option<String>,
}

/// Parse a `lookup_account.php` reply.
pub fn parse_auth_reply(xml: &str) -> ClientResult<AuthReply> {
    let mut reply = AuthReply::default();
    walk_text(xml, |path, text| match path.rsplit('>').next() {
        Some("authenticator") if !text.is_empty() => reply.authenticator = Some(text.to_string()),
        Some("error_msg") => reply.error = Some(text.to_string()),
        _ => {}
    })?;
    // Some servers reply with a bare <error> document.
    if reply.authenticator.is_none() && reply.error.is_none() && xml.contains("<error") {
        reply.error = Some("authentication failed".into());
    }
    Ok(reply)
}

/// Data server reply to an upload or size query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReply {
    /// Status code; `0` is success.
    pub status: i32,
    /// Server message.
    pub message: Option<String>,
    /// Size already stored on the server, for `get_file_size`.
    pub file_size: Option<u64>,
}

impl UploadReply {
    /// Turn a nonzero status into a server error.
    pub fn into_result(self) -> ClientResult<()> {
        if self.status == 0 {
            return Ok(());
        }
        Err(ClientError::error(
            ErrorCode::Server,
            format!(
                "upload rejected with status {}: {}",
                self.status,
                self.message.unwrap_or_default()
            ),
        ))
    }
}

/// Parse a `<data_server_reply>` document.
pub fn parse_upload_reply(xml: &str) -> ClientResult<UploadReply> {
    let mut reply = UploadReply::default();
    walk_text(xml, |path, text| match path {
        "status" => reply.status = number(text),
        "message" => reply.message = Some(text.to_string()),
        "file_size" => reply.file_size = Some(number::<f64>(text) as u64),
        _ => {}
    })?;
    Ok(reply)
}

/// Top-level `(element, text)` pairs of a document, for merging into the
/// configuration store. Elements without text are skipped.
pub fn config_pairs(xml: &str) -> ClientResult<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    walk_text(xml, |path, text| {
        if !path.contains('>') && !text.is_empty() {
            pairs.push((path.to_string(), text.to_string()));
        }
    })?;
    Ok(pairs)
}
