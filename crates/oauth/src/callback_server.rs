use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Duration};

use {
    axum::{Router, extract::Query, response::Html, routing::get},
    tokio::{net::TcpListener, sync::oneshot},
    tracing::{debug, warn},
};

use crate::{Error, Result};

/// Loopback HTTP listener that receives the authorization redirect once,
/// then shuts down.
pub struct CallbackServer {
    listener: TcpListener,
    addr: SocketAddr,
}

impl CallbackServer {
    /// Bind `127.0.0.1` on an ephemeral port.
    pub async fn bind() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        debug!(%addr, "oauth callback listener bound");
        Ok(Self { listener, addr })
    }

    /// Redirect URI to register in the authorization request.
    pub fn redirect_uri(&self) -> String {
        format!("http://{}:{}/", self.addr.ip(), self.addr.port())
    }

    /// Wait for `GET /?code=..&state=..`, check `state` and return the code.
    pub async fn wait_for_code(self, expected_state: String, timeout: Duration) -> Result<String> {
        let (tx, rx) = oneshot::channel::<std::result::Result<String, String>>();
        let tx = Arc::new(std::sync::Mutex::new(Some(tx)));

        let app = Router::new().route(
            "/",
            get(move |Query(params): Query<HashMap<String, String>>| {
                let tx = tx.lock().unwrap_or_else(|e| e.into_inner()).take();
                async move {
                    let result = check_redirect(&params, &expected_state);
                    let page = match &result {
                        Ok(_) => Html(
                            "<h1>Authorization complete</h1><p>You can close this window.</p>"
                                .to_string(),
                        ),
                        Err(e) => Html(format!("<h1>Authorization failed</h1><p>{e}</p>")),
                    };
                    if let Some(tx) = tx {
                        let _ = tx.send(result);
                    }
                    page
                }
            }),
        );

        let server = axum::serve(self.listener, app);

        tokio::select! {
            result = rx => match result {
                Ok(Ok(code)) => Ok(code),
                Ok(Err(reason)) => {
                    warn!(reason = %reason, "oauth redirect rejected");
                    Err(Error::message(format!("authorization failed: {reason}")))
                },
                Err(_) => Err(Error::message("callback handler dropped")),
            },
            _ = server.into_future() => Err(Error::message("callback server exited unexpectedly")),
            () = tokio::time::sleep(timeout) => Err(Error::message(format!(
                "authorization timed out after {} seconds",
                timeout.as_secs()
            ))),
        }
    }
}

fn check_redirect(
    params: &HashMap<String, String>,
    expected_state: &str,
) -> std::result::Result<String, String> {
    if let Some(error) = params.get("error") {
        return Err(error.clone());
    }
    let state = params.get("state").ok_or("missing state")?;
    if state != expected_state {
        return Err("state mismatch".into());
    }
    params
        .get("code")
        .cloned()
        .ok_or_else(|| "missing code".to_string())
}
