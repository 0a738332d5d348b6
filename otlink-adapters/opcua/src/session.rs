use futures::{pin_mut, StreamExt};
use opcua::{
    client::{
        ClientBuilder, IdentityToken, Password, Session, SessionActivity, SessionEventLoop,
        SessionPollResult,
    },
    crypto::SecurityPolicy,
    types::MessageSecurityMode,
};
use otlink_sdk::{AdapterError, AdapterResult, OpcUaAuth, OpcUaConfig};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use url::Url;

fn identity_token(auth: &OpcUaAuth) -> IdentityToken {
    match auth {
        OpcUaAuth::Anonymous => IdentityToken::Anonymous,
        OpcUaAuth::UserPassword { username, password } => {
            IdentityToken::UserName(username.clone(), Password::new(password.clone()))
        }
    }
}

fn build_client(cfg: &OpcUaConfig) -> AdapterResult<opcua::client::Client> {
    // Automatic reconnects are disabled: a lost session is discovered by the
    // pool's liveness check and replaced with a fresh connect.
    //
    // With SecurityPolicy=None and password auth no application certificate
    // is needed; disabling sample keypair generation avoids unnecessary
    // certificate I/O and noisy "Invalid der" errors when PKI is not
    // configured.
    ClientBuilder::new()
        .application_name(&cfg.application_name)
        .application_uri(&cfg.application_uri)
        .pki_dir("./pki")
        .session_retry_limit(0)
        .session_timeout(cfg.session_timeout_ms)
        .keep_alive_interval(Duration::from_millis(cfg.keep_alive_interval_ms as u64))
        .trust_server_certs(false)
        .create_sample_keypair(false)
        .client()
        .map_err(|e| AdapterError::ConnectError(format!("OPC UA build client error: {e:?}")))
}

/// Discover endpoints from the configured URL, select an unsecured one and
/// activate a session on it.
///
/// The server-advertised endpoint host is overridden with the configured
/// URL's host: servers routinely advertise machine names that do not
/// resolve from the client, while the discovery URL is known reachable.
pub(crate) async fn connect_once(
    cfg: &OpcUaConfig,
) -> AdapterResult<(Arc<Session>, SessionEventLoop)> {
    let mut client = build_client(cfg)?;
    let identity = identity_token(&cfg.auth);
    let endpoint_url = cfg.endpoint_url.trim();

    let endpoints = client
        .get_server_endpoints_from_url(endpoint_url)
        .await
        .map_err(|e| {
            AdapterError::ConnectError(format!(
                "OPC UA get endpoints error from {endpoint_url}: {e}"
            ))
        })?;

    let mut selected = endpoints
        .into_iter()
        .find(|ep| {
            ep.security_mode == MessageSecurityMode::None
                && SecurityPolicy::from_uri(ep.security_policy_uri.as_ref())
                    == SecurityPolicy::None
        })
        .ok_or_else(|| {
            AdapterError::ConnectError(format!(
                "No unsecured OPC UA endpoint advertised by {endpoint_url}"
            ))
        })?;

    let advertised_url = selected.endpoint_url.clone();
    if let (Ok(cfg_uri), Ok(mut ep_uri)) = (
        Url::parse(endpoint_url),
        Url::parse(selected.endpoint_url.as_ref()),
    ) {
        if let Some(host) = cfg_uri.host_str() {
            let _ = ep_uri.set_host(Some(host));
        }
        if let Some(port) = cfg_uri.port() {
            let _ = ep_uri.set_port(Some(port));
        }
        selected.endpoint_url = ep_uri.to_string().into();
    }
    debug!(
        endpoint_url = %selected.endpoint_url,
        advertised_url = %advertised_url,
        "OPC UA selected endpoint"
    );

    client
        .connect_to_endpoint_directly(selected, identity)
        .map_err(|e| AdapterError::ConnectError(format!("OPC UA connect error: {e}")))
}

/// Drive the session event loop until the connection is lost or the handle
/// is torn down. The first transport activation resolves the pending
/// connect call through `ready_tx`.
pub(crate) async fn drive_session(
    ev: SessionEventLoop,
    healthy: Arc<AtomicBool>,
    ready_tx: oneshot::Sender<Result<(), String>>,
) {
    let stream = ev.enter();
    pin_mut!(stream);
    let mut ready_tx = Some(ready_tx);

    while let Some(item) = stream.next().await {
        match item {
            Ok(SessionPollResult::Reconnected(_)) | Ok(SessionPollResult::Transport(_)) => {
                healthy.store(true, Ordering::Release);
                if let Some(tx) = ready_tx.take() {
                    let _ = tx.send(Ok(()));
                }
            }
            Ok(SessionPollResult::SessionActivity(activity)) => match activity {
                SessionActivity::KeepAliveSucceeded => {
                    healthy.store(true, Ordering::Release);
                }
                SessionActivity::KeepAliveFailed(code) => {
                    warn!(status = %code, "OPC UA keep-alive failed");
                }
            },
            Ok(SessionPollResult::ConnectionLost(code)) => {
                warn!(status = %code, "OPC UA connection lost");
                healthy.store(false, Ordering::Release);
                break;
            }
            Ok(_) => {}
            Err(code) => {
                healthy.store(false, Ordering::Release);
                if let Some(tx) = ready_tx.take() {
                    let _ = tx.send(Err(format!("session event loop error: {code}")));
                }
                break;
            }
        }
    }
    healthy.store(false, Ordering::Release);
}
