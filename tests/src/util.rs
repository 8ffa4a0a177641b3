//! Loopback SMTP fixtures driving the end-to-end probe tests.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::rustls::pki_types::PrivatePkcs8KeyDer;

/// What one fixture connection does with its client.
pub enum FixtureMode {
    /// Greets and answers EHLO with `features`; never upgrades.
    Plain { features: Vec<String> },
    /// Advertises STARTTLS and completes the upgrade with a self-signed
    /// certificate, then keeps serving inside the session.
    Starttls,
    /// Wraps the connection in TLS before the first SMTP byte.
    TlsOnConnect,
    /// Refuses service in the greeting itself.
    RejectGreeting,
}

/// Spawns a fixture serving exactly one connection; returns its address.
pub async fn spawn_server(mode: FixtureMode) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fixture listener");
    let addr = listener.local_addr().expect("fixture listener addr");

    tokio::spawn(async move {
        let Ok((stream, _peer)) = listener.accept().await else {
            return;
        };
        let _ = handle(stream, mode).await;
    });

    addr
}

/// A port with nothing listening on it, for connection-refused scenarios.
pub async fn unused_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind placeholder listener");
    let addr = listener.local_addr().expect("placeholder listener addr");
    drop(listener);
    addr
}

async fn handle(stream: TcpStream, mode: FixtureMode) -> std::io::Result<()> {
    match mode {
        FixtureMode::RejectGreeting => {
            let mut stream = stream;
            stream
                .write_all(b"554 fixture.test not accepting connections\r\n")
                .await?;
            stream.flush().await
        }
        FixtureMode::Plain { features } => {
            serve_session(stream, &features, true).await?;
            Ok(())
        }
        FixtureMode::Starttls => {
            let features = vec!["STARTTLS".to_string(), "8BITMIME".to_string()];
            match serve_session(stream, &features, true).await? {
                SessionEnd::Starttls(tcp) => {
                    let tls = tls_acceptor().accept(tcp).await?;
                    // STARTTLS wipes the session state; no second greeting.
                    serve_session(tls, &["8BITMIME".to_string()], false).await?;
                    Ok(())
                }
                SessionEnd::Quit => Ok(()),
            }
        }
        FixtureMode::TlsOnConnect => {
            let tls = tls_acceptor().accept(stream).await?;
            serve_session(tls, &["8BITMIME".to_string()], true).await?;
            Ok(())
        }
    }
}

enum SessionEnd<S> {
    Quit,
    Starttls(S),
}

async fn serve_session<S>(
    stream: S,
    features: &[String],
    greet: bool,
) -> std::io::Result<SessionEnd<S>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut stream = BufReader::new(stream);

    if greet {
        stream.write_all(b"220 fixture.test ESMTP ready\r\n").await?;
        stream.flush().await?;
    }

    let mut line = String::new();
    loop {
        line.clear();
        if stream.read_line(&mut line).await? == 0 {
            return Ok(SessionEnd::Quit);
        }

        let command = line.trim().to_ascii_uppercase();
        if command.starts_with("EHLO") {
            let mut reply = String::from("250-fixture.test greets you\r\n");
            for feature in features {
                reply.push_str("250-");
                reply.push_str(feature);
                reply.push_str("\r\n");
            }
            reply.push_str("250 HELP\r\n");
            stream.write_all(reply.as_bytes()).await?;
        } else if command.starts_with("STARTTLS") {
            stream.write_all(b"220 ready to start TLS\r\n").await?;
            stream.flush().await?;
            return Ok(SessionEnd::Starttls(stream.into_inner()));
        } else if command.starts_with("QUIT") {
            stream.write_all(b"221 fixture.test closing\r\n").await?;
            stream.flush().await?;
            return Ok(SessionEnd::Quit);
        } else {
            stream.write_all(b"502 command not implemented\r\n").await?;
        }
        stream.flush().await?;
    }
}

fn tls_acceptor() -> TlsAcceptor {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
        .expect("generate fixture certificate");
    let cert = certified.cert.der().clone();
    let key = PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der());

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert], key.into())
        .expect("build fixture TLS config");

    TlsAcceptor::from(Arc::new(config))
}
