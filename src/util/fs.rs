//! Filesystem and hashing helpers.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;

/// Hex MD5 digest of a file's content.
pub fn md5_file(path: impl AsRef<Path>) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut context = md5::Context::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        context.consume(&buf[..n]);
    }
    Ok(format!("{:x}", context.compute()))
}

/// Hex MD5 digest of a byte slice.
pub fn md5_hex(data: impl AsRef<[u8]>) -> String {
    format!("{:x}", md5::compute(data))
}

/// Account password hash: MD5 of the password followed by the email.
pub fn password_hash(email: &str, password: &str) -> String {
    let mut context = md5::Context::new();
    context.consume(password.as_bytes());
    context.consume(email.as_bytes());
    format!("{:x}", context.compute())
}

/// Write `contents` to `temp`, then rename it over `path`.
///
/// Readers of `path` see either the previous content or the new content, never a
/// truncated file.
pub fn write_atomic(path: &Path, temp: &Path, contents: impl AsRef<[u8]>) -> io::Result<()> {
    fs::write(temp, contents)?;
    match fs::rename(temp, path) {
        Ok(()) => Ok(()),
        // Some platforms refuse to rename over an existing file.
        Err(_) if path.exists() => {
            fs::remove_file(path)?;
            fs::rename(temp, path)
        }
        Err(e) => Err(e),
    }
}

/// Recursively remove a directory; a missing directory is not an error.
pub fn remove_dir_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Owner read/write, plus execute when `executable`.
#[cfg(unix)]
pub fn set_file_mode(path: &Path, executable: bool) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mode = if executable { 0o700 } else { 0o600 };
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

/// Owner read/write, plus execute when `executable`.
#[cfg(not(unix))]
pub fn set_file_mode(_path: &Path, _executable: bool) -> io::Result<()> {
    Ok(())
}
