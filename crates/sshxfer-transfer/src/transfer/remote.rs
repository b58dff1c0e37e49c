// ── Remote seam – SSH transport and SFTP filesystem ─────────────────────────

use crate::transfer::session::{AuthMethod, SessionConfig};
use log::{debug, info, warn};
use secrecy::ExposeSecret;
use ssh2::{OpenFlags, OpenType, Session, Sftp};
use std::io::{self, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Component, Path, PathBuf};

const DIR_MODE: i32 = 0o755;
const FILE_MODE: i32 = 0o644;

/// Opens authenticated SSH connections.
pub trait Connector: Send + Sync {
    fn dial(&self, host: &str, port: u16, config: &SessionConfig)
        -> io::Result<Box<dyn RemoteShell>>;
}

/// An authenticated connection. Dropping it closes the transport.
pub trait RemoteShell {
    fn open_sftp(&mut self) -> io::Result<Box<dyn RemoteFs>>;
}

/// The file-transfer sub-protocol session. Dropping it closes the channel.
pub trait RemoteFs {
    /// `mkdir -p`: create every missing component of `dir`.
    fn mkdir_all(&mut self, dir: &str) -> io::Result<()>;
    /// Create or truncate `path` for writing.
    fn create(&mut self, path: &str) -> io::Result<Box<dyn Write>>;
}

// ── ssh2 implementation ──────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy)]
pub struct Ssh2Connector;

impl Connector for Ssh2Connector {
    fn dial(
        &self,
        host: &str,
        port: u16,
        config: &SessionConfig,
    ) -> io::Result<Box<dyn RemoteShell>> {
        let tcp = connect_tcp(host, port, config)?;

        let mut session = Session::new()?;
        // Bounds handshake and auth; cleared below so streaming is unbounded.
        session.set_timeout(config.timeout.as_millis().min(u32::MAX as u128) as u32);
        session.set_tcp_stream(tcp);
        session.handshake()?;

        config.host_trust.verify(&session, host, port)?;
        authenticate(&session, config)?;
        if !session.authenticated() {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("authentication as '{}' was not accepted", config.username),
            ));
        }
        session.set_timeout(0);

        info!(
            "SSH session established to {}:{} as '{}' ({})",
            host,
            port,
            config.username,
            config.auth.name()
        );
        Ok(Box::new(Ssh2Shell { session }))
    }
}

fn connect_tcp(host: &str, port: u16, config: &SessionConfig) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, config.timeout) {
            Ok(tcp) => return Ok(tcp),
            Err(e) => {
                debug!("TCP connect to {} failed: {}", addr, e);
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no addresses resolved for {}:{}", host, port),
        )
    }))
}

fn authenticate(session: &Session, config: &SessionConfig) -> io::Result<()> {
    match &config.auth {
        AuthMethod::Password(password) => {
            session.userauth_password(&config.username, password.expose_secret())?
        }
        AuthMethod::PublicKey { private_key_path } => {
            session.userauth_pubkey_file(&config.username, None, private_key_path, None)?
        }
    }
    Ok(())
}

pub struct Ssh2Shell {
    session: Session,
}

impl RemoteShell for Ssh2Shell {
    fn open_sftp(&mut self) -> io::Result<Box<dyn RemoteFs>> {
        let sftp = self.session.sftp()?;
        Ok(Box::new(Ssh2Fs { sftp }))
    }
}

impl Drop for Ssh2Shell {
    fn drop(&mut self) {
        if let Err(e) = self.session.disconnect(None, "Client disconnecting", None) {
            debug!("SSH disconnect failed: {}", e);
        }
    }
}

pub struct Ssh2Fs {
    sftp: Sftp,
}

impl RemoteFs for Ssh2Fs {
    fn mkdir_all(&mut self, dir: &str) -> io::Result<()> {
        let mut current = PathBuf::new();
        let mut created = 0usize;

        for component in Path::new(dir).components() {
            current.push(component);
            if !matches!(component, Component::Normal(_)) {
                continue;
            }

            match self.sftp.stat(&current) {
                Ok(stat) if stat.is_dir() => continue,
                Ok(_) => {
                    return Err(io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        format!("'{}' exists and is not a directory", current.display()),
                    ))
                }
                Err(_) => {}
            }

            if let Err(e) = self.sftp.mkdir(&current, DIR_MODE) {
                // Another writer may have created it between stat and mkdir.
                match self.sftp.stat(&current) {
                    Ok(stat) if stat.is_dir() => {
                        warn!("Remote directory '{}' appeared concurrently", current.display());
                        continue;
                    }
                    _ => return Err(e.into()),
                }
            }
            created += 1;
        }

        if created > 0 {
            info!("SFTP mkdir -p: {} ({} created)", dir, created);
        }
        Ok(())
    }

    fn create(&mut self, path: &str) -> io::Result<Box<dyn Write>> {
        let file = self.sftp.open_mode(
            Path::new(path),
            OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
            FILE_MODE,
            OpenType::File,
        )?;
        Ok(Box::new(file))
    }
}

// ── Paths ────────────────────────────────────────────────────────────────────

/// Parent directory of a remote path using POSIX rules:
/// `/a/b` → `/a`, `/a` → `/`, `a` → `.`.
pub fn remote_parent(path: &str) -> String {
    let Some(idx) = path.rfind('/') else {
        return ".".to_string();
    };
    let dir = path[..idx].trim_end_matches('/');
    if dir.is_empty() {
        if path.starts_with('/') {
            "/".to_string()
        } else {
            ".".to_string()
        }
    } else {
        dir.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_of_absolute_paths() {
        assert_eq!(remote_parent("/remote/dir/a.txt"), "/remote/dir");
        assert_eq!(remote_parent("/a.txt"), "/");
        assert_eq!(remote_parent("/a//b.txt"), "/a");
    }

    #[test]
    fn parent_of_relative_paths() {
        assert_eq!(remote_parent("a.txt"), ".");
        assert_eq!(remote_parent("uploads/a.txt"), "uploads");
        assert_eq!(remote_parent("uploads/nested/"), "uploads/nested");
    }
}
