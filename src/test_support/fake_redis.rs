//! Minimal RESP2 server holding strings and sets in memory.
//!
//! Covers the commands the session store and rate limiter issue
//! (`SETEX`, `SET`, `GET`, `DEL`, `EXISTS`, `INCR`, `EXPIRE`, `SADD`, `SREM`,
//! `SMEMBERS`, `PING`). Expiry is accepted and ignored; anything else gets `+OK`.

use redis::aio::ConnectionManager;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

enum Entry {
    Str(Vec<u8>),
    Set(BTreeSet<String>),
}

type Store = Arc<Mutex<HashMap<String, Entry>>>;

/// Start a fake server on an ephemeral port and connect a manager to it.
pub async fn fake_redis() -> ConnectionManager {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let store: Store = Arc::new(Mutex::new(HashMap::new()));

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(serve(socket, store.clone()));
        }
    });

    let client = redis::Client::open(format!("redis://{}/", addr)).unwrap();
    ConnectionManager::new(client).await.unwrap()
}

async fn serve(socket: TcpStream, store: Store) {
    let (read, mut write) = socket.into_split();
    let mut reader = BufReader::new(read);

    while let Some(args) = read_command(&mut reader).await {
        let reply = execute(&store, &args);
        if write.write_all(&reply).await.is_err() {
            return;
        }
    }
}

async fn read_line<R: AsyncBufReadExt + Unpin>(reader: &mut R) -> Option<String> {
    let mut line = String::new();
    match reader.read_line(&mut line).await {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim_end().to_string()),
    }
}

async fn read_command<R: AsyncBufReadExt + Unpin>(reader: &mut R) -> Option<Vec<String>> {
    let header = read_line(reader).await?;
    let count: usize = header.strip_prefix('*')?.parse().ok()?;

    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        let len: usize = read_line(reader).await?.strip_prefix('$')?.parse().ok()?;
        let mut buf = vec![0u8; len + 2];
        reader.read_exact(&mut buf).await.ok()?;
        buf.truncate(len);
        args.push(String::from_utf8_lossy(&buf).into_owned());
    }
    Some(args)
}

fn integer(n: i64) -> Vec<u8> {
    format!(":{}\r\n", n).into_bytes()
}

fn bulk(value: Option<&[u8]>) -> Vec<u8> {
    match value {
        None => b"$-1\r\n".to_vec(),
        Some(bytes) => {
            let mut out = format!("${}\r\n", bytes.len()).into_bytes();
            out.extend_from_slice(bytes);
            out.extend_from_slice(b"\r\n");
            out
        }
    }
}

fn execute(store: &Store, args: &[String]) -> Vec<u8> {
    let Some(name) = args.first() else {
        return b"-ERR empty command\r\n".to_vec();
    };
    let mut data = match store.lock() {
        Ok(data) => data,
        Err(poisoned) => poisoned.into_inner(),
    };

    match name.to_ascii_uppercase().as_str() {
        "PING" => b"+PONG\r\n".to_vec(),
        "SET" if args.len() >= 3 => {
            data.insert(args[1].clone(), Entry::Str(args[2].clone().into_bytes()));
            b"+OK\r\n".to_vec()
        }
        "SETEX" if args.len() >= 4 => {
            data.insert(args[1].clone(), Entry::Str(args[3].clone().into_bytes()));
            b"+OK\r\n".to_vec()
        }
        "GET" if args.len() >= 2 => match data.get(&args[1]) {
            Some(Entry::Str(value)) => bulk(Some(value)),
            _ => bulk(None),
        },
        "DEL" => integer(args[1..].iter().filter(|k| data.remove(*k).is_some()).count() as i64),
        "EXISTS" => integer(args[1..].iter().filter(|k| data.contains_key(*k)).count() as i64),
        "EXPIRE" if args.len() >= 2 => integer(data.contains_key(&args[1]) as i64),
        "INCR" if args.len() >= 2 => {
            let current = match data.get(&args[1]) {
                Some(Entry::Str(value)) => String::from_utf8_lossy(value).parse::<i64>().unwrap_or(0),
                _ => 0,
            };
            let next = current + 1;
            data.insert(args[1].clone(), Entry::Str(next.to_string().into_bytes()));
            integer(next)
        }
        "SADD" if args.len() >= 2 => {
            let entry = data
                .entry(args[1].clone())
                .or_insert_with(|| Entry::Set(BTreeSet::new()));
            match entry {
                Entry::Set(set) => {
                    integer(args[2..].iter().filter(|m| set.insert((*m).clone())).count() as i64)
                }
                Entry::Str(_) => b"-WRONGTYPE\r\n".to_vec(),
            }
        }
        "SREM" if args.len() >= 2 => match data.get_mut(&args[1]) {
            Some(Entry::Set(set)) => {
                integer(args[2..].iter().filter(|m| set.remove(*m)).count() as i64)
            }
            _ => integer(0),
        },
        "SMEMBERS" if args.len() >= 2 => {
            let members: Vec<String> = match data.get(&args[1]) {
                Some(Entry::Set(set)) => set.iter().cloned().collect(),
                _ => Vec::new(),
            };
            let mut out = format!("*{}\r\n", members.len()).into_bytes();
            for member in members {
                out.extend(bulk(Some(member.as_bytes())));
            }
            out
        }
        _ => b"+OK\r\n".to_vec(),
    }
}
