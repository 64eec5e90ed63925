use crate::value::Value;
use bytes::Bytes;
use host_core::{HostError, HostResult};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Reads one request off the wire: an array of length-prefixed bulk strings,
/// e.g. `*2\r\n$4\r\nPING\r\n$0\r\n\r\n`. Returns `Ok(None)` on a clean EOF before
/// any bytes of a new request have arrived (the normal way a connection closes).
pub async fn read_request<R>(reader: &mut R) -> HostResult<Option<Vec<Bytes>>>
where
    R: AsyncBufRead + Unpin,
{
    let mut header = String::new();
    let read = reader
        .read_line(&mut header)
        .await
        .map_err(|e| HostError::BadRequest(format!("io error reading frame: {e}")))?;
    if read == 0 {
        return Ok(None);
    }
    let header = header.trim_end_matches(['\r', '\n']);
    let count = parse_prefixed(header, '*')?;

    let mut items = Vec::with_capacity(count.max(0) as usize);
    for _ in 0..count {
        items.push(read_bulk_string(reader).await?);
    }
    Ok(Some(items))
}

async fn read_bulk_string<R>(reader: &mut R) -> HostResult<Bytes>
where
    R: AsyncBufRead + Unpin,
{
    let mut header = String::new();
    reader
        .read_line(&mut header)
        .await
        .map_err(|e| HostError::BadRequest(format!("io error reading bulk header: {e}")))?;
    let header = header.trim_end_matches(['\r', '\n']);
    let len = parse_prefixed(header, '$')?;
    if len < 0 {
        return Ok(Bytes::new());
    }
    let len = len as usize;
    let mut buf = vec![0u8; len + 2]; // payload + trailing CRLF
    reader
        .read_exact(&mut buf)
        .await
        .map_err(|e| HostError::BadRequest(format!("io error reading bulk body: {e}")))?;
    buf.truncate(len);
    Ok(Bytes::from(buf))
}

fn parse_prefixed(line: &str, sigil: char) -> HostResult<i64> {
    let mut chars = line.chars();
    match chars.next() {
        Some(c) if c == sigil => {}
        _ => {
            return Err(HostError::BadRequest(format!(
                "expected '{sigil}' prefix, got {line:?}"
            )))
        }
    }
    chars
        .as_str()
        .parse::<i64>()
        .map_err(|_| HostError::BadRequest(format!("malformed length in {line:?}")))
}

/// Writes a response value. Top-level errors use the `-CODE message\r\n`
/// simple-error form; everything else recurses through the RESP-like encoding.
pub async fn write_response<W>(writer: &mut W, result: &HostResult<Value>) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    match result {
        Ok(value) => write_value(writer, value).await,
        Err(err) => {
            let line = format!("-{} {}\r\n", err.code(), err.message());
            writer.write_all(line.as_bytes()).await
        }
    }
}

fn write_value<'a, W>(
    writer: &'a mut W,
    value: &'a Value,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + 'a>>
where
    W: AsyncWrite + Unpin + Send,
{
    Box::pin(async move {
        match value {
            Value::Null => writer.write_all(b"$-1\r\n").await,
            Value::Integer(n) => writer.write_all(format!(":{n}\r\n").as_bytes()).await,
            Value::String(s) => {
                writer
                    .write_all(format!("${}\r\n{}\r\n", s.len(), s).as_bytes())
                    .await
            }
            Value::Array(items) => {
                writer
                    .write_all(format!("*{}\r\n", items.len()).as_bytes())
                    .await?;
                for item in items {
                    write_value(writer, item).await?;
                }
                Ok(())
            }
            Value::Map(map) => {
                writer
                    .write_all(format!("*{}\r\n", map.len() * 2).as_bytes())
                    .await?;
                for (k, v) in map {
                    write_value(writer, &Value::String(k.clone())).await?;
                    write_value(writer, v).await?;
                }
                Ok(())
            }
        }
    })
}

/// Convenience for tests: read one value back the way a client would, used by
/// the command-handler round-trip property (§8).
pub async fn read_value<R>(reader: &mut R) -> HostResult<Value>
where
    R: AsyncBufRead + Unpin,
{
    let mut header = String::new();
    reader
        .read_line(&mut header)
        .await
        .map_err(|e| HostError::BadRequest(format!("io error: {e}")))?;
    let trimmed = header.trim_end_matches(['\r', '\n']);
    let Some(sigil) = trimmed.chars().next() else {
        return Err(HostError::BadRequest("empty response line".into()));
    };
    match sigil {
        '+' => Ok(Value::String(trimmed[1..].to_string())),
        '-' => {
            let rest = trimmed[1..].trim();
            let (code, msg) = rest.split_once(' ').unwrap_or((rest, ""));
            Err(HostError::BadRequest(format!("{code} {msg}")))
        }
        ':' => trimmed[1..]
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| HostError::BadRequest("malformed integer reply".into())),
        '$' => {
            let len: i64 = trimmed[1..]
                .parse()
                .map_err(|_| HostError::BadRequest("malformed bulk length".into()))?;
            if len < 0 {
                return Ok(Value::Null);
            }
            let mut buf = vec![0u8; len as usize + 2];
            AsyncReadExt::read_exact(reader, &mut buf)
                .await
                .map_err(|e| HostError::BadRequest(format!("io error: {e}")))?;
            buf.truncate(len as usize);
            Ok(Value::String(
                String::from_utf8(buf).unwrap_or_default(),
            ))
        }
        '*' => {
            let len: i64 = trimmed[1..]
                .parse()
                .map_err(|_| HostError::BadRequest("malformed array length".into()))?;
            let mut items = Vec::with_capacity(len.max(0) as usize);
            for _ in 0..len {
                items.push(Box::pin(read_value(reader)).await?);
            }
            Ok(Value::Array(items))
        }
        other => Err(HostError::BadRequest(format!("unknown reply sigil {other:?}"))),
    }
}

#[allow(dead_code)]
fn _assert_read_bound<R: AsyncRead>() {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn decodes_simple_request() {
        let raw = b"*1\r\n$4\r\nPING\r\n".to_vec();
        let mut reader = BufReader::new(Cursor::new(raw));
        let items = read_request(&mut reader).await.unwrap().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(&items[0][..], b"PING");
    }

    #[tokio::test]
    async fn clean_eof_yields_none() {
        let mut reader = BufReader::new(Cursor::new(Vec::<u8>::new()));
        assert!(read_request(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn encodes_and_decodes_array_value() {
        let mut buf = Vec::new();
        let value = Value::Array(vec![Value::Integer(1), Value::String("ok".into())]);
        write_response(&mut buf, &Ok(value.clone())).await.unwrap();
        let mut reader = BufReader::new(Cursor::new(buf));
        let decoded = read_value(&mut reader).await.unwrap();
        assert_eq!(decoded, Value::Array(vec![Value::Integer(1), Value::String("ok".into())]));
    }

    #[tokio::test]
    async fn encodes_error_with_code_prefix() {
        let mut buf = Vec::new();
        write_response(&mut buf, &Err(HostError::NotFound("game 9".into())))
            .await
            .unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "-404 game 9\r\n");
    }
}
