use hashbrown::HashMap;
use tokio::io::{AsyncRead, AsyncWrite, BufStream};
use tokio::net::TcpStream;
use tracing::debug;

use crate::routeros::codec::{read_sentence, write_sentence};
use crate::router::RouterError;

/// Attribute words of a single `!re` reply.
pub(crate) type Row = HashMap<String, String>;

/// One authenticated API session.
pub(crate) struct ApiConnection<S> {
    stream: S,
}

impl ApiConnection<BufStream<TcpStream>> {
    pub(crate) async fn connect(host: &str, port: u16) -> Result<Self, RouterError> {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;

        Ok(ApiConnection::new(BufStream::new(stream)))
    }
}

impl<S> ApiConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub(crate) const fn new(stream: S) -> Self {
        ApiConnection { stream }
    }

    pub(crate) async fn login(
        &mut self,
        username: &str,
        password: &str,
    ) -> Result<(), RouterError> {
        let name = format!("=name={username}");
        let password = format!("=password={password}");
        write_sentence(&mut self.stream, &["/login", name.as_str(), password.as_str()]).await?;

        let reply = read_sentence(&mut self.stream).await?;
        match reply.first().map(String::as_str) {
            Some("!done") => {
                // Pre-6.43 routers answer with an MD5 challenge instead.
                if attributes(&reply).contains_key("ret") {
                    return Err(RouterError::Protocol("legacy challenge login".to_string()));
                }

                Ok(())
            }
            Some("!trap") => Err(RouterError::Trap { message: message(&reply) }),
            Some("!fatal") => Err(RouterError::Fatal { message: fatal_message(&reply) }),
            other => Err(unexpected(other)),
        }
    }

    /// Runs `/<path>/print` and collects every returned row.
    pub(crate) async fn print(&mut self, path: &str) -> Result<Vec<Row>, RouterError> {
        let command = format!("/{}/print", path.trim_matches('/'));
        write_sentence(&mut self.stream, &[command.as_str()]).await?;

        let mut rows = Vec::new();
        let mut trap = None;
        loop {
            let reply = read_sentence(&mut self.stream).await?;
            match reply.first().map(String::as_str) {
                Some("!re") => rows.push(attributes(&reply)),
                // RouterOS 7.18+ reports an empty result as `!empty` before `!done`.
                Some("!empty") => {}
                // A trap is followed by `!done`; drain it to keep the stream aligned.
                Some("!trap") => trap = Some(message(&reply)),
                Some("!done") => break,
                Some("!fatal") => return Err(RouterError::Fatal { message: fatal_message(&reply) }),
                other => return Err(unexpected(other)),
            }
        }

        if let Some(message) = trap {
            return Err(RouterError::Trap { message });
        }
        debug!(%command, rows = rows.len(), "RouterOS print complete");

        Ok(rows)
    }
}

fn attributes(sentence: &[String]) -> Row {
    sentence
        .iter()
        .skip(1)
        .filter_map(|word| word.strip_prefix('='))
        .filter_map(|word| word.split_once('='))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

fn message(sentence: &[String]) -> String {
    attributes(sentence)
        .remove("message")
        .unwrap_or_else(|| "unknown error".to_string())
}

fn fatal_message(sentence: &[String]) -> String {
    sentence.get(1).cloned().unwrap_or_default()
}

fn unexpected(reply: Option<&str>) -> RouterError {
    RouterError::Protocol(format!("unexpected reply; reply={}", reply.unwrap_or("<empty>")))
}

#[cfg(test)]
mod tests {
    use expect_test::expect;
    use tokio::io::{duplex, DuplexStream};

    use super::*;
    use crate::routeros::codec::encode_sentence;

    /// Scripted router: answers each received sentence with the next batch of
    /// reply sentences and returns everything it received.
    async fn fake_router(
        mut stream: DuplexStream,
        script: Vec<Vec<Vec<&'static str>>>,
    ) -> Vec<Vec<String>> {
        use tokio::io::AsyncWriteExt;

        let mut received = Vec::new();
        for replies in script {
            received.push(read_sentence(&mut stream).await.unwrap());
            for reply in replies {
                stream.write_all(&encode_sentence(&reply).unwrap()).await.unwrap();
            }
        }

        received
    }

    #[tokio::test]
    async fn login_and_print_rows() {
        let (client, server) = duplex(4096);
        let router = tokio::spawn(fake_router(
            server,
            vec![
                vec![vec!["!done"]],
                vec![
                    vec!["!re", "=.id=*1", "=name=alice", "=address=10.0.0.2", "=caller-id=AA:BB"],
                    vec!["!re", "=.id=*2", "=name=bob", "=comment=a=b"],
                    vec!["!done"],
                ],
            ],
        ));

        let mut conn = ApiConnection::new(client);
        conn.login("admin", "secret").await.unwrap();
        let rows = conn.print("ppp/active").await.unwrap();
        drop(conn);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["name"], "alice");
        assert_eq!(rows[0]["caller-id"], "AA:BB");
        assert_eq!(rows[0][".id"], "*1");
        assert_eq!(rows[1]["comment"], "a=b");

        let received = router.await.unwrap();
        expect![[r#"
            [
                [
                    "/login",
                    "=name=admin",
                    "=password=secret",
                ],
                [
                    "/ppp/active/print",
                ],
            ]
        "#]]
        .assert_debug_eq(&received);
    }

    #[tokio::test]
    async fn login_trap_is_error() {
        let (client, server) = duplex(4096);
        tokio::spawn(fake_router(
            server,
            vec![vec![vec!["!trap", "=message=invalid user name or password (6)"], vec!["!done"]]],
        ));

        let err = ApiConnection::new(client).login("admin", "wrong").await.unwrap_err();

        expect!["Trap; message=invalid user name or password (6)"].assert_eq(&err.to_string());
    }

    #[tokio::test]
    async fn legacy_challenge_rejected() {
        let (client, server) = duplex(4096);
        tokio::spawn(fake_router(
            server,
            vec![vec![vec!["!done", "=ret=ebddd18303a54111e2dea05a92ab46b4"]]],
        ));

        let err = ApiConnection::new(client).login("admin", "pw").await.unwrap_err();

        assert!(matches!(err, RouterError::Protocol(_)), "{err:?}");
    }

    #[tokio::test]
    async fn print_trap_drains_done() {
        let (client, server) = duplex(4096);
        tokio::spawn(fake_router(
            server,
            vec![vec![vec!["!trap", "=message=no such command prefix"], vec!["!done"]]],
        ));

        let err = ApiConnection::new(client).print("/bogus/").await.unwrap_err();

        expect!["Trap; message=no such command prefix"].assert_eq(&err.to_string());
    }

    #[tokio::test]
    async fn print_empty_reply_is_no_rows() {
        let (client, server) = duplex(4096);
        tokio::spawn(fake_router(server, vec![vec![vec!["!empty"], vec!["!done"]]]));

        let rows = ApiConnection::new(client).print("ppp/active").await.unwrap();

        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn print_fatal_is_error() {
        let (client, server) = duplex(4096);
        tokio::spawn(fake_router(
            server,
            vec![vec![vec!["!fatal", "session terminated on request"]]],
        ));

        let err = ApiConnection::new(client).print("interface").await.unwrap_err();

        expect!["Fatal; message=session terminated on request"].assert_eq(&err.to_string());
    }

    #[tokio::test]
    async fn closed_connection_is_io_error() {
        let (client, server) = duplex(4096);
        drop(server);

        let err = ApiConnection::new(client).print("interface").await.unwrap_err();

        assert!(matches!(err, RouterError::Io(_)), "{err:?}");
    }
}
