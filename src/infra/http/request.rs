//! Request documents sent to the project server.

use std::fmt::Write as _;

use quick_xml::escape::escape;

use crate::config::{Configuration, Parameter};
use crate::core::{FileInfo, WorkUnit};

const CORE_CLIENT_MAJOR: u32 = 6;
const CORE_CLIENT_MINOR: u32 = 2;
const CORE_CLIENT_RELEASE: u32 = 19;

/// Result state reported for a successful run.
pub const RESULT_STATE_DONE: u32 = 5;
/// Result state reported for a failed run.
pub const RESULT_STATE_ERROR: u32 = 3;

fn element(out: &mut String, indent: &str, name: &str, value: &str) {
    let _ = writeln!(out, "{indent}<{name}>{}</{name}>", escape(value));
}

fn client_version(out: &mut String, indent: &str) {
    let _ = writeln!(out, "{indent}<core_client_major_version>{CORE_CLIENT_MAJOR}</core_client_major_version>");
    let _ = writeln!(out, "{indent}<core_client_minor_version>{CORE_CLIENT_MINOR}</core_client_minor_version>");
    let _ = writeln!(out, "{indent}<core_client_release>{CORE_CLIENT_RELEASE}</core_client_release>");
}

fn request_preamble(out: &mut String, config: &Configuration) {
    out.push_str("<scheduler_request>\n");
    element(out, "", "authenticator", &config.text_or_empty(Parameter::Authenticator));
    element(out, "", "hostid", &config.text_or_empty(Parameter::HostId));
    out.push_str("<rpc_seqno>0</rpc_seqno>\n");
    client_version(out, "");
    out.push_str("<work_req_seconds>1.000000</work_req_seconds>\n");
    out.push_str("<resource_share_fraction>1.000000</resource_share_fraction>\n");
    out.push_str("<estimated_delay>0.000000</estimated_delay>\n");
    out.push_str("<duration_correction_factor>1.000000</duration_correction_factor>\n");
    element(out, "", "platform_name", &config.text_or_empty(Parameter::PlatformName));
}

fn request_trailer(out: &mut String) {
    out.push_str("<other_results>\n</other_results>\n");
    out.push_str("<in_progress_results>\n</in_progress_results>\n");
    out.push_str("</scheduler_request>\n");
}

/// Work request: asks the scheduler for one new assignment.
pub fn work_request(config: &Configuration) -> String {
    let mut out = String::with_capacity(2048);
    request_preamble(&mut out, config);
    out.push_str("<time_stats>\n");
    out.push_str("<on_frac>1.000000</on_frac>\n");
    out.push_str("<connected_frac>1.000000</connected_frac>\n");
    out.push_str("<active_frac>1.000000</active_frac>\n");
    out.push_str("<cpu_efficiency>1.000000</cpu_efficiency>\n");
    out.push_str("</time_stats>\n");
    out.push_str("<host_info>\n");
    out.push_str("<timezone>0</timezone>\n");
    element(&mut out, "", "domain_name", &host_name());
    out.push_str("<ip_addr>127.0.0.1</ip_addr>\n");
    element(&mut out, "", "host_cpid", &config.text_or_empty(Parameter::HostCpid));
    element(&mut out, "", "p_ncpus", &config.text_or_empty(Parameter::HostCpuCount));
    element(&mut out, "", "os_name", &config.text_or_empty(Parameter::HostOsName));
    out.push_str("</host_info>\n");
    out.push_str("<result>\n</result>\n");
    request_trailer(&mut out);
    out
}

/// Result report for a finished (or failed) work unit.
pub fn result_report(config: &Configuration, workunit: &WorkUnit, failed: bool) -> String {
    let manifest = &workunit.manifest;
    let platform = config.text_or_empty(Parameter::PlatformName);
    let version = manifest.app.version.clone().unwrap_or_default();
    let state = if failed { RESULT_STATE_ERROR } else { RESULT_STATE_DONE };

    let mut out = String::with_capacity(1024);
    request_preamble(&mut out, config);
    out.push_str("<result>\n");
    element(&mut out, "    ", "name", manifest.result.name.as_deref().unwrap_or_default());
    let _ = writeln!(out, "    <final_cpu_time>{}.000000</final_cpu_time>", manifest.result.cpu_time);
    let _ = writeln!(out, "    <exit_status>{}</exit_status>", u32::from(failed));
    let _ = writeln!(out, "    <state>{state}</state>");
    element(&mut out, "    ", "platform", &platform);
    element(&mut out, "    ", "version_num", &version);
    element(&mut out, "    ", "app_version_num", &version);
    out.push_str("    <stderr_out>\n    </stderr_out>\n");
    out.push_str("</result>\n");
    request_trailer(&mut out);
    out
}

/// Data server query for the size already stored for `file`.
pub fn file_size_request(file: &FileInfo) -> String {
    let mut out = String::from("<data_server_request>\n");
    client_version(&mut out, "    ");
    element(&mut out, "    ", "get_file_size", &file.name);
    out.push_str("</data_server_request>\n");
    out
}

/// Upload header; the file content follows `<data>` directly.
pub fn upload_header(file: &FileInfo, nbytes: u64, checksum: &str) -> String {
    let mut out = String::from("<data_server_request>\n");
    client_version(&mut out, "    ");
    out.push_str("<file_upload>\n<file_info>\n");
    element(&mut out, "    ", "name", &file.name);
    if file.flags.generated_locally {
        out.push_str("    <generated_locally/>\n");
    }
    if file.flags.upload {
        out.push_str("    <upload_when_present/>\n");
    }
    let _ = writeln!(out, "    <max_nbytes>{}</max_nbytes>", file.max_nbytes);
    element(&mut out, "    ", "url", file.url.as_deref().unwrap_or_default());
    // Signature is echoed verbatim; the server verifies it byte for byte.
    let _ = writeln!(
        out,
        "<xml_signature>{}</xml_signature>",
        file.xml_signature.as_deref().unwrap_or_default()
    );
    out.push_str("</file_info>\n");
    let _ = writeln!(out, "<nbytes>{nbytes}</nbytes>");
    element(&mut out, "", "md5_cksum", checksum);
    out.push_str("<offset>0</offset>\n<data>\n");
    out
}

fn host_name() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".into())
}
