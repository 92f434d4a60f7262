/// A parsed source/destination location string: `remote://user@host:/path`
/// or a bare absolute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Local(std::path::PathBuf),
    Remote {
        user: String,
        host: String,
        path: String,
    },
}

impl Location {
    pub fn parse(raw: &str) -> Self {
        if let Some(rest) = raw.strip_prefix("remote://")
            && let Some((user, host_path)) = rest.split_once('@')
            && let Some((host, path)) = host_path.split_once(':')
        {
            return Location::Remote {
                user: user.to_string(),
                host: host.to_string(),
                path: path.to_string(),
            };
        }
        Location::Local(std::path::PathBuf::from(raw))
    }

    /// The root path this location points at, regardless of variant.
    pub fn path(&self) -> &str {
        match self {
            Location::Local(path) => path.to_str().unwrap_or_default(),
            Location::Remote { path, .. } => path.as_str(),
        }
    }
}
