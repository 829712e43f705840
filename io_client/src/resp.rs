//! A hand-written RESP (REdis Serialization Protocol) codec.
//!
//! §6.4 asks for exactly five reply kinds (bulk string, integer,
//! simple status, array, nil, and error) over a bespoke wire protocol
//! — there is no crates.io RESP client that fits this engine's
//! single-threaded, manually-pipelined command lifecycle (§4.5), so
//! this is hand-rolled the way `influxdb_line_protocol` hand-writes
//! its own wire format rather than pulling in a generic parser for a
//! one-off grammar.
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// One parsed RESP reply.
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    Simple(String),
    Error(String),
    Integer(i64),
    /// `None` is the RESP "null bulk string" (`$-1\r\n`).
    Bulk(Option<Vec<u8>>),
    /// `None` is the RESP "null array" (`*-1\r\n`).
    Array(Option<Vec<RespValue>>),
}

#[derive(Debug, snafu::Snafu)]
pub enum RespError {
    #[snafu(display("connection closed while reading a reply"))]
    Eof,
    #[snafu(display("malformed RESP line: {line:?}"))]
    Malformed { line: String },
    #[snafu(display("i/o error reading reply: {source}"))]
    Io { source: std::io::Error },
}

impl From<std::io::Error> for RespError {
    fn from(source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::UnexpectedEof {
            RespError::Eof
        } else {
            RespError::Io { source }
        }
    }
}

async fn read_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<String, RespError> {
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Err(RespError::Eof);
    }
    // strip trailing \r\n (or just \n if the peer is lax)
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(line)
}

/// Read and parse one RESP value, recursing into arrays.
pub async fn read_reply<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<RespValue, RespError> {
    let line = read_line(reader).await?;
    let (prefix, rest) = line.split_at(1);

    match prefix {
        "+" => Ok(RespValue::Simple(rest.to_string())),
        "-" => Ok(RespValue::Error(rest.to_string())),
        ":" => {
            let n: i64 = rest
                .parse()
                .map_err(|_| RespError::Malformed { line: line.clone() })?;
            Ok(RespValue::Integer(n))
        }
        "$" => {
            let len: i64 = rest
                .parse()
                .map_err(|_| RespError::Malformed { line: line.clone() })?;
            if len < 0 {
                return Ok(RespValue::Bulk(None));
            }
            let len = len as usize;
            let mut buf = vec![0u8; len];
            reader.read_exact(&mut buf).await?;
            // consume the trailing \r\n
            let mut crlf = [0u8; 2];
            reader.read_exact(&mut crlf).await?;
            Ok(RespValue::Bulk(Some(buf)))
        }
        "*" => {
            let len: i64 = rest
                .parse()
                .map_err(|_| RespError::Malformed { line: line.clone() })?;
            if len < 0 {
                return Ok(RespValue::Array(None));
            }
            let mut items = Vec::with_capacity(len as usize);
            for _ in 0..len {
                items.push(Box::pin(read_reply(reader)).await?);
            }
            Ok(RespValue::Array(Some(items)))
        }
        _ => Err(RespError::Malformed { line }),
    }
}

/// Encode a command as a RESP array of bulk strings, e.g.
/// `encode_command(&["HGET", "k", "f"])` produces `*3\r\n$4\r\nHGET\r\n...`.
pub fn encode_command(args: &[impl AsRef<str>]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(format!("*{}\r\n", args.len()).as_bytes());
    for arg in args {
        let arg = arg.as_ref();
        out.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
        out.extend_from_slice(arg.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::io::BufReader;

    async fn parse(bytes: &[u8]) -> RespValue {
        let mut reader = BufReader::new(Cursor::new(bytes.to_vec()));
        read_reply(&mut reader).await.unwrap()
    }

    #[tokio::test]
    async fn parses_simple_status() {
        assert_eq!(parse(b"+OK\r\n").await, RespValue::Simple("OK".into()));
    }

    #[tokio::test]
    async fn parses_error() {
        assert_eq!(parse(b"-ERR bad thing\r\n").await, RespValue::Error("ERR bad thing".into()));
    }

    #[tokio::test]
    async fn parses_integer() {
        assert_eq!(parse(b":42\r\n").await, RespValue::Integer(42));
    }

    #[tokio::test]
    async fn parses_bulk_string() {
        assert_eq!(parse(b"$5\r\nhello\r\n").await, RespValue::Bulk(Some(b"hello".to_vec())));
    }

    #[tokio::test]
    async fn parses_nil_bulk_string() {
        assert_eq!(parse(b"$-1\r\n").await, RespValue::Bulk(None));
    }

    #[tokio::test]
    async fn parses_array_of_bulk_strings() {
        let value = parse(b"*2\r\n$1\r\na\r\n$1\r\nb\r\n").await;
        assert_eq!(
            value,
            RespValue::Array(Some(vec![
                RespValue::Bulk(Some(b"a".to_vec())),
                RespValue::Bulk(Some(b"b".to_vec())),
            ]))
        );
    }

    #[tokio::test]
    async fn parses_nil_array() {
        assert_eq!(parse(b"*-1\r\n").await, RespValue::Array(None));
    }

    #[tokio::test]
    async fn eof_mid_reply_is_an_error() {
        let mut reader = BufReader::new(Cursor::new(b"$5\r\nhel".to_vec()));
        assert!(matches!(read_reply(&mut reader).await, Err(RespError::Eof)));
    }

    #[test]
    fn encode_command_matches_resp_array_of_bulk_strings() {
        let bytes = encode_command(&["HGET", "k", "f"]);
        assert_eq!(bytes, b"*3\r\n$4\r\nHGET\r\n$1\r\nk\r\n$1\r\nf\r\n");
    }
}
