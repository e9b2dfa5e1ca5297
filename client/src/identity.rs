//! Registration, key exchange and the saved client identity.

use std::{path::Path, time::Duration};

use anyhow::{anyhow, bail, Context};
use shared::types::{ClientId, SymmetricKey};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{info, warn};

use crate::{
    defaults::{REGISTRATION_ATTEMPTS, REGISTRATION_RETRY_DELAY},
    key_manager::KeyManager,
    net_server::{requests, Connection, RequestError},
};

/// Who we are to the server, persisted in the identity file after the first registration.
pub struct Identity {
    pub name: String,
    pub client_id: ClientId,
    pub keys: KeyManager,
}

/// An established identity with the symmetric key for this run.
pub struct Session {
    pub client_id: ClientId,
    pub symmetric_key: SymmetricKey,
}

impl Identity {
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("unable to read {}", path.display()))?;

        Self::parse(&contents).with_context(|| format!("invalid identity in {}", path.display()))
    }

    pub async fn save(&self, path: &Path) -> anyhow::Result<()> {
        tokio::fs::write(path, self.serialize()?)
            .await
            .with_context(|| format!("unable to write {}", path.display()))
    }

    fn parse(contents: &str) -> anyhow::Result<Self> {
        let mut parts = contents.splitn(3, '\n');

        let name = parts.next().unwrap_or_default().trim();
        if name.is_empty() {
            bail!("name is missing");
        }

        let client_id = hex::decode(parts.next().unwrap_or_default().trim()).context("client id is not hex")?;
        let client_id = ClientId::try_from(client_id.as_slice()).map_err(|_| anyhow!("client id must be 16 bytes"))?;

        let keys = KeyManager::from_pem(parts.next().unwrap_or_default())?;

        Ok(Self {
            name: name.to_owned(),
            client_id,
            keys,
        })
    }

    fn serialize(&self) -> anyhow::Result<String> {
        Ok(format!("{}\n{}\n{}", self.name, hex::encode(self.client_id), self.keys.to_pem()?))
    }
}

/// Obtains a session, reconnecting with the saved identity when there is one and registering
/// otherwise.
pub async fn login<S>(conn: &mut Connection<S>, name: &str, identity_path: &Path) -> anyhow::Result<Session>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if !identity_path.exists() {
        return register(conn, name, identity_path).await;
    }

    let identity = Identity::load(identity_path).await?;
    if identity.name != name {
        warn!("saved identity belongs to {}, not {name}", identity.name);
    }

    match requests::reconnect(conn, identity.client_id, &identity.name).await? {
        Some(wrapped_key) => {
            info!(client = %hex::encode(identity.client_id), "reconnected");
            Ok(Session {
                client_id: identity.client_id,
                symmetric_key: identity.keys.unwrap_key(&wrapped_key)?,
            })
        }
        None => recover(conn, &identity, name, identity_path).await,
    }
}

/// Repeats the key exchange for a saved identity the server refused to reconnect, which happens
/// when an earlier run registered but never completed the exchange. Registers from scratch when
/// the server doesn't know the identity at all.
async fn recover<S>(
    conn: &mut Connection<S>,
    identity: &Identity,
    name: &str,
    identity_path: &Path,
) -> anyhow::Result<Session>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    warn!("server refused the saved identity, repeating the key exchange");

    let public_key = identity.keys.get_pubkey()?;
    match requests::exchange_keys(conn, identity.client_id, &identity.name, public_key).await {
        Ok(wrapped_key) => Ok(Session {
            client_id: identity.client_id,
            symmetric_key: identity.keys.unwrap_key(&wrapped_key)?,
        }),
        Err(RequestError::ServerError) => {
            warn!("server doesn't know the saved identity, registering again");
            register(conn, name, identity_path).await
        }
        Err(e) => Err(e.into()),
    }
}

/// Registers `name`, saves the new identity and performs the key exchange.
pub async fn register<S>(conn: &mut Connection<S>, name: &str, identity_path: &Path) -> anyhow::Result<Session>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let client_id = register_with_retry(conn, name).await?;
    info!(client = %hex::encode(client_id), "registered as {name}");

    let identity = Identity {
        name: name.to_owned(),
        client_id,
        keys: KeyManager::generate()?,
    };
    identity.save(identity_path).await?;

    let wrapped_key = requests::exchange_keys(conn, client_id, name, identity.keys.get_pubkey()?).await?;

    Ok(Session {
        client_id,
        symmetric_key: identity.keys.unwrap_key(&wrapped_key)?,
    })
}

async fn register_with_retry<S>(conn: &mut Connection<S>, name: &str) -> anyhow::Result<ClientId>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut attempts = REGISTRATION_ATTEMPTS;
    loop {
        match requests::register(conn, name).await {
            Ok(Some(client_id)) => return Ok(client_id),
            Ok(None) => bail!("the name {name} is already registered"),
            Err(RequestError::ServerError) if attempts > 1 => {
                attempts -= 1;
                warn!("registration failed, will try {attempts} more times");
                tokio::time::sleep(Duration::from_secs(REGISTRATION_RETRY_DELAY)).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}
