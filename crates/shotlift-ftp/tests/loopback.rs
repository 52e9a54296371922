//! Drives the real FTP client against a scripted in-process server on
//! 127.0.0.1, exercising the control and passive data channels end to end.

use shotlift_core::{
    BackendOptions, CaptureSource, ConnectionInfo, DuplicateRequest, MemoryArtifact, TransferBackend,
    TransferEvents, TransferItem,
};
use shotlift_ftp::FtpBackend;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

const USER: &str = "bob";
const PASSWORD: &str = "secret";

#[derive(Default)]
struct ServerState {
    dirs: HashSet<String>,
    files: HashMap<String, Vec<u8>>,
    commands: Vec<String>,
}

type Shared = Arc<Mutex<ServerState>>;

fn parent_of(path: &str) -> String {
    match path.rsplit_once('/') {
        Some(("", _)) | None => "/".to_string(),
        Some((parent, _)) => parent.to_string(),
    }
}

async fn start_server(dirs: &[&str]) -> (u16, Shared) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let state: Shared = Arc::default();
    {
        let mut s = state.lock().unwrap();
        s.dirs.insert("/".into());
        s.dirs.extend(dirs.iter().map(|d| d.to_string()));
    }

    let accept_state = Arc::clone(&state);
    tokio::spawn(async move {
        while let Ok((sock, _)) = listener.accept().await {
            let state = Arc::clone(&accept_state);
            tokio::spawn(async move {
                let _ = handle_control(sock, state).await;
            });
        }
    });
    (port, state)
}

async fn handle_control(sock: TcpStream, state: Shared) -> std::io::Result<()> {
    let (rd, mut wr) = sock.into_split();
    let mut lines = BufReader::new(rd).lines();
    let mut passive: Option<TcpListener> = None;

    wr.write_all(b"220 loopback ready\r\n").await?;

    while let Some(line) = lines.next_line().await? {
        let (verb, arg) = match line.split_once(' ') {
            Some((v, a)) => (v.to_uppercase(), a.to_string()),
            None => (line.to_uppercase(), String::new()),
        };
        state.lock().unwrap().commands.push(verb.clone());

        let reply = match verb.as_str() {
            "USER" if arg == USER => "331 Password required".to_string(),
            "USER" => "530 Unknown user".to_string(),
            "PASS" if arg == PASSWORD => "230 Logged in".to_string(),
            "PASS" => "530 Login incorrect".to_string(),
            "FEAT" => "502 Not implemented".to_string(),
            "TYPE" => "200 Type set to I".to_string(),
            "PWD" => "257 \"/\" is the current directory".to_string(),
            "CWD" => {
                let known = state.lock().unwrap().dirs.contains(&arg);
                if known {
                    "250 Directory changed".to_string()
                } else {
                    "550 No such directory".to_string()
                }
            }
            "MKD" => {
                state.lock().unwrap().dirs.insert(arg.clone());
                format!("257 \"{}\" created", arg)
            }
            "PASV" => {
                let data = TcpListener::bind("127.0.0.1:0").await?;
                let port = data.local_addr()?.port();
                passive = Some(data);
                format!("227 Entering Passive Mode (127,0,0,1,{},{})", port / 256, port % 256)
            }
            "STOR" => {
                let parent_known = state.lock().unwrap().dirs.contains(&parent_of(&arg));
                match passive.take() {
                    None => "425 Use PASV first".to_string(),
                    Some(_) if !parent_known => "550 No such directory".to_string(),
                    Some(data) => {
                        wr.write_all(b"150 Ok to send data\r\n").await?;
                        let (mut stream, _) = data.accept().await?;
                        let mut buf = Vec::new();
                        stream.read_to_end(&mut buf).await?;
                        state.lock().unwrap().files.insert(arg.clone(), buf);
                        "226 Transfer complete".to_string()
                    }
                }
            }
            "LIST" => match passive.take() {
                None => "425 Use PASV first".to_string(),
                Some(data) => {
                    let listing: String = {
                        let s = state.lock().unwrap();
                        s.files
                            .iter()
                            .filter(|(path, _)| parent_of(path) == arg)
                            .map(|(path, bytes)| {
                                let name = path.rsplit('/').next().unwrap_or(path);
                                format!("-rw-r--r--   1 ftp ftp {:>6} Jan  1 12:00 {}\r\n", bytes.len(), name)
                            })
                            .collect()
                    };
                    wr.write_all(b"150 Here comes the listing\r\n").await?;
                    let (mut stream, _) = data.accept().await?;
                    stream.write_all(listing.as_bytes()).await?;
                    drop(stream);
                    "226 Directory send OK".to_string()
                }
            },
            "DELE" => {
                if state.lock().unwrap().files.remove(&arg).is_some() {
                    "250 Deleted".to_string()
                } else {
                    "550 File not found".to_string()
                }
            }
            "QUIT" => {
                wr.write_all(b"221 Goodbye\r\n").await?;
                return Ok(());
            }
            _ => "502 Command not implemented".to_string(),
        };
        wr.write_all(format!("{}\r\n", reply).as_bytes()).await?;
    }
    Ok(())
}

fn info(port: u16, password: &str) -> ConnectionInfo {
    ConnectionInfo::new("127.0.0.1", port, USER)
        .with_password(password)
        .with_timeout_ms(5_000)
}

#[tokio::test]
async fn upload_creates_parent_and_undo_deletes() {
    let (port, state) = start_server(&[]).await;
    let backend = FtpBackend::new(info(port, PASSWORD), BackendOptions::default());
    let item = TransferItem::new(MemoryArtifact::png(b"\x89PNG fake".to_vec(), CaptureSource::Desktop));

    let outcome = backend.upload(Arc::clone(&item), "/shots/a.png").await.unwrap();
    assert_eq!(outcome.remote_path(), Some("/shots/a.png"));
    assert_eq!(item.remote_path().as_deref(), Some("/shots/a.png"));
    {
        let s = state.lock().unwrap();
        assert!(s.dirs.contains("/shots"));
        assert_eq!(s.files.get("/shots/a.png").map(Vec::as_slice), Some(&b"\x89PNG fake"[..]));
    }

    assert!(backend.undo_upload(Arc::clone(&item)).await.unwrap());
    assert!(!item.is_uploaded());
    assert!(state.lock().unwrap().files.is_empty());
}

#[tokio::test]
async fn wrong_password_is_a_connection_error() {
    let (port, state) = start_server(&[]).await;
    let backend = FtpBackend::new(info(port, "nope"), BackendOptions::default());
    let item = TransferItem::new(MemoryArtifact::png(vec![1], CaptureSource::Desktop));

    let err = backend.upload(item, "/a.png").await.unwrap_err();
    assert!(err.is_connection_error());
    assert_eq!(err.host.as_deref(), Some("127.0.0.1"));
    assert!(!state.lock().unwrap().commands.contains(&"STOR".to_string()));
}

#[tokio::test]
async fn replace_overwrites_existing_remote_file() {
    let (port, state) = start_server(&["/shots"]).await;
    state
        .lock()
        .unwrap()
        .files
        .insert("/shots/old-shot.png".into(), b"old".to_vec());

    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("shot.png");
    std::fs::write(&local, b"new").unwrap();
    let item = TransferItem::from_file(&local);

    let options = BackendOptions::new(TransferEvents::new())
        .with_duplicate_check(Arc::new(|req: &DuplicateRequest| req.replace()));
    let backend = FtpBackend::new(info(port, PASSWORD), options);

    let outcome = backend.upload(Arc::clone(&item), "/shots/shot.png").await.unwrap();
    assert_eq!(outcome.remote_path(), Some("/shots/old-shot.png"));

    let s = state.lock().unwrap();
    assert_eq!(s.files.len(), 1);
    assert_eq!(s.files.get("/shots/old-shot.png").map(Vec::as_slice), Some(&b"new"[..]));
}

#[tokio::test]
async fn unreachable_server_is_a_connection_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let backend = FtpBackend::new(info(port, PASSWORD), BackendOptions::default());
    let item = TransferItem::new(MemoryArtifact::png(vec![1], CaptureSource::Desktop));
    let err = backend.upload(item, "/a.png").await.unwrap_err();
    assert!(err.is_connection_error());
}
