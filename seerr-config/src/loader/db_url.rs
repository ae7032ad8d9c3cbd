use std::{fs::read_to_string, path::Path};

use url::Url;

use crate::{
    ConfigLoadError,
    models::sources::{EnvConfig, FileDatabaseConfig},
    util::parse_number,
};

const DEFAULT_POSTGRES_PORT: u16 = 5432;

/// Resolve the connection URL. Order: `DATABASE_URL`, `DATABASE_URL_FILE`,
/// `[database].url` (with a resolved password injected when it has none),
/// then a URL assembled from `DATABASE_HOST`, `DATABASE_USER` and
/// `DATABASE_NAME`.
pub fn resolve_database_url(
    env: &EnvConfig,
    file_database: &FileDatabaseConfig,
) -> Result<Option<String>, ConfigLoadError> {
    if let Some(url) = env.database_url.clone() {
        return Ok(Some(url));
    }

    if let Some(path) = env.database_url_file.as_ref()
        && let Some(url) = read_secret_file(path)?
    {
        return Ok(Some(url));
    }

    if let Some(stored_url) = file_database.url.as_deref() {
        let trimmed = stored_url.trim();
        if !trimmed.is_empty() {
            let mut parsed = Url::parse(trimmed).map_err(|source| {
                ConfigLoadError::InvalidDatabaseUrl { source }
            })?;
            if parsed.password().is_none()
                && let Some(password) =
                    resolve_database_password(env, file_database)?
            {
                parsed
                    .set_password(Some(&password))
                    .map_err(|_| ConfigLoadError::InvalidDatabasePassword)?;
            }
            return Ok(Some(parsed.to_string()));
        }
    }

    if let (Some(host), Some(user), Some(name)) = (
        env.database_host.as_deref(),
        env.database_user.as_deref(),
        env.database_name.as_deref(),
    ) {
        let port = match env.database_port.as_deref() {
            Some(raw) => parse_number::<u16>("DATABASE_PORT", raw)?,
            None => DEFAULT_POSTGRES_PORT,
        };
        let mut url = Url::parse(&format!("postgresql://{host}:{port}/{name}"))
            .map_err(|source| ConfigLoadError::InvalidDatabaseUrl { source })?;
        url.set_username(user).map_err(|_| {
            ConfigLoadError::InvalidDatabaseUsername {
                username: user.to_string(),
            }
        })?;
        if let Some(password) = resolve_database_password(env, file_database)? {
            url.set_password(Some(&password))
                .map_err(|_| ConfigLoadError::InvalidDatabasePassword)?;
        }
        return Ok(Some(url.to_string()));
    }

    Ok(None)
}

pub fn resolve_database_password(
    env: &EnvConfig,
    file_database: &FileDatabaseConfig,
) -> Result<Option<String>, ConfigLoadError> {
    if let Some(password) = env.database_password.clone() {
        return Ok(Some(password));
    }

    for path in [
        env.database_password_file.as_ref(),
        file_database.password_file.as_ref(),
    ]
    .into_iter()
    .flatten()
    {
        if let Some(secret) = read_secret_file(path)? {
            return Ok(Some(secret));
        }
    }

    Ok(None)
}

/// Trimmed file contents; `None` for an empty file.
pub fn read_secret_file(path: &Path) -> Result<Option<String>, ConfigLoadError> {
    let contents = read_to_string(path).map_err(|source| {
        ConfigLoadError::SecretFileIo {
            path: path.to_path_buf(),
            source,
        }
    })?;
    let trimmed = contents.trim();
    if trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn secret(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{contents}").unwrap();
        file
    }

    #[test]
    fn env_url_wins_over_everything() {
        let env = EnvConfig {
            database_url: Some("postgres://env/db".into()),
            database_host: Some("ignored".into()),
            ..EnvConfig::default()
        };
        let file = FileDatabaseConfig {
            url: Some("postgres://file/db".into()),
            ..FileDatabaseConfig::default()
        };
        assert_eq!(
            resolve_database_url(&env, &file).unwrap().as_deref(),
            Some("postgres://env/db")
        );
    }

    #[test]
    fn url_file_is_trimmed() {
        let url_file = secret("  postgres://from-file/db  ");
        let env = EnvConfig {
            database_url_file: Some(url_file.path().to_path_buf()),
            ..EnvConfig::default()
        };
        assert_eq!(
            resolve_database_url(&env, &FileDatabaseConfig::default())
                .unwrap()
                .as_deref(),
            Some("postgres://from-file/db")
        );
    }

    #[test]
    fn file_url_gets_the_password_from_a_secret_file() {
        let password = secret("s3cr3t");
        let file = FileDatabaseConfig {
            url: Some("postgres://seerr@db:5432/seerr".into()),
            password_file: Some(password.path().to_path_buf()),
            ..FileDatabaseConfig::default()
        };
        let url = resolve_database_url(&EnvConfig::default(), &file)
            .unwrap()
            .unwrap();
        assert_eq!(url, "postgres://seerr:s3cr3t@db:5432/seerr");
    }

    #[test]
    fn parts_are_assembled_with_the_default_port() {
        let env = EnvConfig {
            database_host: Some("db".into()),
            database_user: Some("seerr".into()),
            database_name: Some("requests".into()),
            database_password: Some("p@ss".into()),
            ..EnvConfig::default()
        };
        let url = resolve_database_url(&env, &FileDatabaseConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(url, "postgresql://seerr:p%40ss@db:5432/requests");
    }

    #[test]
    fn bad_port_names_the_key() {
        let env = EnvConfig {
            database_host: Some("db".into()),
            database_user: Some("seerr".into()),
            database_name: Some("requests".into()),
            database_port: Some("http".into()),
            ..EnvConfig::default()
        };
        let err =
            resolve_database_url(&env, &FileDatabaseConfig::default()).unwrap_err();
        assert!(err.to_string().contains("DATABASE_PORT"));
    }

    #[test]
    fn nothing_configured_is_none() {
        assert!(
            resolve_database_url(&EnvConfig::default(), &FileDatabaseConfig::default())
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn missing_secret_file_is_an_error() {
        let env = EnvConfig {
            database_url_file: Some("/nonexistent/seerr-url".into()),
            ..EnvConfig::default()
        };
        assert!(matches!(
            resolve_database_url(&env, &FileDatabaseConfig::default()),
            Err(ConfigLoadError::SecretFileIo { .. })
        ));
    }
}
