use std::fmt::{Display, Formatter};
use std::str::FromStr;

use thiserror::Error;

const SCHEME: &str = "mongodb://";
const SRV_SCHEME: &str = "mongodb+srv://";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UriError {
    #[error("The connection string must start with `mongodb://` or `mongodb+srv://`")]
    Scheme,

    #[error("The connection string has no host")]
    NoHost,

    #[error("The connection string must end with `/database.collection`")]
    MissingNamespace,

    #[error("The database name is empty")]
    EmptyDatabase,

    #[error("The collection name is empty")]
    EmptyCollection,

    #[error("Invalid option `{0}`, expected `name=value`")]
    InvalidOption(String),
}

/// Location and credentials of a MongoDB collection.
///
/// The textual form is a MongoDB connection string whose path names both the database and the
/// collection:
///
/// ```text
/// mongodb://[username[:password]@]host[:port][,host[:port]...]/database.collection[?options]
/// ```
///
/// Credentials are kept as written, still percent-encoded. The `Display` implementation hides
/// the password.
#[derive(Clone, PartialEq, Eq)]
pub struct MongoUri {
    srv: bool,
    username: Option<String>,
    password: Option<String>,
    hosts: Vec<String>,
    database: String,
    collection: String,
    options: Vec<(String, String)>,
}

impl MongoUri {
    pub fn new<I, S>(hosts: I, database: &str, collection: &str) -> Result<Self, UriError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let hosts = hosts.into_iter().map(Into::into).collect::<Vec<String>>();
        if hosts.is_empty() || hosts.iter().any(|h| h.is_empty()) {
            return Err(UriError::NoHost);
        }
        if database.is_empty() {
            return Err(UriError::EmptyDatabase);
        }
        if collection.is_empty() {
            return Err(UriError::EmptyCollection);
        }
        Ok(Self {
            srv: false,
            username: None,
            password: None,
            hosts,
            database: database.to_string(),
            collection: collection.to_string(),
            options: Vec::new(),
        })
    }

    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.username = Some(username.to_string());
        self.password = Some(password.to_string());
        self
    }

    pub fn with_option(mut self, name: &str, value: &str) -> Self {
        self.options.push((name.to_string(), value.to_string()));
        self
    }

    pub fn parse(uri: &str) -> Result<Self, UriError> {
        let (srv, rest) = if let Some(rest) = uri.strip_prefix(SCHEME) {
            (false, rest)
        } else if let Some(rest) = uri.strip_prefix(SRV_SCHEME) {
            (true, rest)
        } else {
            return Err(UriError::Scheme);
        };

        let (rest, query) = match rest.split_once('?') {
            Some((rest, query)) => (rest, Some(query)),
            None => (rest, None),
        };
        let (authority, namespace) = rest.split_once('/').ok_or(UriError::MissingNamespace)?;

        let (user_info, hosts) = match authority.rsplit_once('@') {
            Some((user_info, hosts)) => (Some(user_info), hosts),
            None => (None, authority),
        };
        let (username, password) = match user_info {
            Some(info) => match info.split_once(':') {
                Some((user, password)) => (Some(user.to_string()), Some(password.to_string())),
                None => (Some(info.to_string()), None),
            },
            None => (None, None),
        };

        let (database, collection) = namespace
            .split_once('.')
            .ok_or(UriError::MissingNamespace)?;

        let options = query
            .into_iter()
            .flat_map(|q| q.split('&'))
            .filter(|option| !option.is_empty())
            .map(|option| match option.split_once('=') {
                Some((name, value)) if !name.is_empty() => {
                    Ok((name.to_string(), value.to_string()))
                }
                _ => Err(UriError::InvalidOption(option.to_string())),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut uri = Self::new(hosts.split(','), database, collection)?;
        uri.srv = srv;
        uri.username = username;
        uri.password = password;
        uri.options = options;
        Ok(uri)
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn options(&self) -> &[(String, String)] {
        &self.options
    }

    /// `database.collection`
    pub fn namespace(&self) -> String {
        format!("{}.{}", self.database, self.collection)
    }

    /// The connection string to give to the driver: the path holds only the database, which is
    /// also the one used for authentication unless an `authSource` option says otherwise.
    pub fn driver_uri(&self) -> String {
        self.format(self.password.as_deref(), false)
    }

    fn format(&self, password: Option<&str>, with_collection: bool) -> String {
        let mut out = String::from(if self.srv { SRV_SCHEME } else { SCHEME });
        if let Some(username) = &self.username {
            out.push_str(username);
            if let Some(password) = password {
                out.push(':');
                out.push_str(password);
            }
            out.push('@');
        }
        out.push_str(&self.hosts.join(","));
        out.push('/');
        out.push_str(&self.database);
        if with_collection {
            out.push('.');
            out.push_str(&self.collection);
        }
        if !self.options.is_empty() {
            out.push('?');
            let options = self
                .options
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>();
            out.push_str(&options.join("&"));
        }
        out
    }
}

impl FromStr for MongoUri {
    type Err = UriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for MongoUri {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let password = self.password.as_ref().map(|_| "***");
        write!(f, "{}", self.format(password, true))
    }
}

impl std::fmt::Debug for MongoUri {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "MongoUri({self})")
    }
}
