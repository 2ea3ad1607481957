//! Writes downloaded material to disk: certificate files for NetworkManager
//! mode and the `.ovpn` file for file mode.

use std::fs::{self, OpenOptions, Permissions};
use std::io::Write;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::error::PersistError;
use crate::payload::Certificates;

/// Directory under `$HOME` receiving the certificate files.
pub const CERT_DIR_NAME: &str = ".cert";
pub const DEFAULT_CA_FILE: &str = "arachne-ca.crt";
pub const DEFAULT_CERT_FILE: &str = "arachne-cert.crt";
pub const DEFAULT_KEY_FILE: &str = "arachne-cert.key";

/// File name of the saved OpenVPN configuration in file mode.
pub const OVPN_FILE_NAME: &str = "OpenVPN_arachne.conf";

/// Owner read/write only.
const PRIVATE_KEY_MODE: u32 = 0o600;

/// Where the CA certificate, user certificate and private key live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificatePaths {
    pub ca: PathBuf,
    pub cert: PathBuf,
    pub key: PathBuf,
}

impl CertificatePaths {
    /// Paths in `cert_dir`, using the payload's file names when given.
    /// Names that are not a plain file name fall back to the default, so
    /// every path stays inside `cert_dir`.
    pub fn resolve(cert_dir: &Path, certs: &Certificates) -> Self {
        let pick = |name: &Option<String>, default: &str| {
            let name = match name.as_deref() {
                None | Some("") => default,
                Some(n) if is_plain_file_name(n) => n,
                Some(n) => {
                    warn!("Ignoring certificate file name '{}', using {}", n, default);
                    default
                }
            };
            cert_dir.join(name)
        };
        Self {
            ca: pick(&certs.ca_cert_filename, DEFAULT_CA_FILE),
            cert: pick(&certs.user_cert_filename, DEFAULT_CERT_FILE),
            key: pick(&certs.private_key_filename, DEFAULT_KEY_FILE),
        }
    }
}

/// `true` if `name` is exactly one normal path component.
fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Certificate directory for a home directory.
pub fn cert_dir(home: &Path) -> PathBuf {
    home.join(CERT_DIR_NAME)
}

/// Write the three certificate files into `cert_dir`. The private key is
/// restricted to its owner.
pub fn materialize(
    cert_dir: &Path,
    certs: &Certificates,
) -> Result<CertificatePaths, PersistError> {
    create_dir(cert_dir)?;

    let paths = CertificatePaths::resolve(cert_dir, certs);
    write_file(&paths.ca, certs.ca_cert.as_bytes(), None)?;
    write_file(&paths.cert, certs.user_cert.as_bytes(), None)?;
    write_file(&paths.key, certs.private_key.as_bytes(), Some(PRIVATE_KEY_MODE))?;

    debug!("Certificates written to {}", cert_dir.display());
    Ok(paths)
}

/// Save an OpenVPN configuration as `OpenVPN_arachne.conf` in `destination`.
pub fn save_config_file(destination: &Path, content: &[u8]) -> Result<PathBuf, PersistError> {
    create_dir(destination)?;
    let path = destination.join(OVPN_FILE_NAME);
    write_file(&path, content, None)?;
    debug!("OpenVPN configuration written to {}", path.display());
    Ok(path)
}

fn create_dir(dir: &Path) -> Result<(), PersistError> {
    fs::create_dir_all(dir).map_err(|source| PersistError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })
}

fn write_file(path: &Path, content: &[u8], mode: Option<u32>) -> Result<(), PersistError> {
    let write_err = |source| PersistError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    if let Some(mode) = mode {
        options.mode(mode);
    }
    let mut file = options.open(path).map_err(write_err)?;

    // `mode` only applies to newly created files.
    if let Some(mode) = mode {
        file.set_permissions(Permissions::from_mode(mode))
            .map_err(|source| PersistError::Permissions {
                path: path.to_path_buf(),
                source,
            })?;
    }

    file.write_all(content).map_err(write_err)?;
    Ok(())
}
