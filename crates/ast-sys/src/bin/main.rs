// main.rs — process entry point (§6 "CLI", §5 "Scheduling model").
//
// A single executable that prompts `Network Type (S/C/default)` and
// dispatches to the server or client role, matching §6's external
// interface exactly (the teacher's own `WinMain`/console-command startup
// is likewise one process deciding its role from input rather than
// separate binaries per role).

use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ast_common::console::{log_dev, log_error, log_info, set_verbose};
use ast_common::net_addr::NetAddr;
use ast_common::srt::PacketSink;
use ast_common::time::now_millis;
use ast_server::filexfer::{FileXferManager, SessionStatus};
use ast_server::server::{ServerConfig, ServerContext};

use ast_sys::cli::{self, NetworkMode};
use ast_sys::filexfer_control::{self, ControlResponse, DownloadRsp};
use ast_sys::net_udp::DatagramEndpoint;

const TICK_DT_SECS: f32 = 1.0 / 30.0;
const BROADCAST_INTERVAL: Duration = Duration::from_millis(16); // ~60 Hz
const INGEST_POLL: Duration = Duration::from_millis(5);

fn main() {
    set_verbose(std::env::var("AST_DEV").is_ok());

    match cli::prompt_network_type() {
        NetworkMode::Server => run_server(),
        NetworkMode::Client => run_client(),
        NetworkMode::SinglePlayer => {
            log_info("single-player mode is outside this core's contract; exiting".to_string());
        }
    }
}

fn load_or_default_config() -> ast_common::config::ServerConfig {
    let path = Path::new("server.cfg");
    match ast_common::config::load_config(path) {
        Ok(cfg) => cfg,
        Err(e) => {
            log_dev(format!("main: {e}, using defaults"));
            ast_common::config::ServerConfig::default()
        }
    }
}

fn run_server() {
    let file_cfg = load_or_default_config();
    let bind_addr = NetAddr::new(file_cfg.server_ip.octets(), file_cfg.server_udp_port);

    let endpoint = match DatagramEndpoint::bind(bind_addr, 1024) {
        Ok(ep) => ep,
        Err(e) => {
            log_error(format!("server: could not bind {bind_addr}: {e}"));
            return;
        }
    };
    log_info(format!("server: listening on {}", endpoint.local_addr()));
    let endpoint = Arc::new(endpoint);

    let ctx = Arc::new(ServerContext::new(ServerConfig::default()));
    let shutdown = Arc::new(AtomicBool::new(false));

    let ingest = {
        let ctx = ctx.clone();
        let shutdown = shutdown.clone();
        let mut sink = endpoint.sink();
        let endpoint = endpoint.clone();
        thread::spawn(move || {
            while !shutdown.load(Ordering::Relaxed) {
                match endpoint.try_recv() {
                    Some(pkt) => ctx.handle_inbound(&mut sink, pkt.from, &pkt.data, now_millis()),
                    None => thread::sleep(INGEST_POLL),
                }
            }
        })
    };

    let broadcast = {
        let ctx = ctx.clone();
        let shutdown = shutdown.clone();
        let mut sink = endpoint.sink();
        thread::spawn(move || {
            while !shutdown.load(Ordering::Relaxed) {
                let now = now_millis();
                ctx.broadcast_snapshot(&mut sink, now);
                ctx.srt_tick(&mut sink, now);
                thread::sleep(BROADCAST_INTERVAL);
            }
        })
    };

    let control = {
        let shutdown = shutdown.clone();
        thread::spawn(move || run_control_plane(bind_addr, shutdown))
    };

    // Fixed-dt game loop runs on this thread (§5: "one thread running the
    // fixed-step game loop"); once it reports game-over the process
    // broadcasts the final leaderboard for a few cycles, then shuts down.
    loop {
        thread::sleep(Duration::from_secs_f32(TICK_DT_SECS));
        if ctx.tick(TICK_DT_SECS) {
            log_info("server: game over, broadcasting final leaderboard".to_string());
            let mut sink = endpoint.sink();
            for _ in 0..10 {
                ctx.broadcast_leaderboard(&mut sink, now_millis());
                thread::sleep(BROADCAST_INTERVAL);
            }
            break;
        }
    }

    shutdown.store(true, Ordering::Relaxed);
    let _ = ingest.join();
    let _ = broadcast.join();
    drop(control); // control-plane listener is killed with the process
}

/// TCP control-plane accept loop: one thread per incoming `DOWNLOAD_REQ`,
/// each standing up its own ephemeral data-plane socket and file-transfer
/// session (§4.10, §5 "one thread per active file-transfer session").
fn run_control_plane(game_addr: NetAddr, shutdown: Arc<AtomicBool>) {
    let control_addr = NetAddr::new(game_addr.ip, game_addr.port.wrapping_add(1));
    let listener = match TcpListener::bind(std::net::SocketAddr::from(control_addr)) {
        Ok(l) => l,
        Err(e) => {
            log_error(format!("control: could not bind {control_addr}: {e}"));
            return;
        }
    };
    log_info(format!("control: file-transfer control plane on {control_addr}"));

    for incoming in listener.incoming() {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }
        let Ok(mut stream) = incoming else { continue };
        thread::spawn(move || {
            let req = match filexfer_control::recv_request(&mut stream) {
                Ok(req) => req,
                Err(e) => {
                    log_dev(format!("control: bad request: {e}"));
                    return;
                }
            };

            let files_dir = PathBuf::from("files");
            let file_path = files_dir.join(&req.filename);
            let bytes = match std::fs::read(&file_path) {
                Ok(b) => b,
                Err(e) => {
                    log_dev(format!("control: {} unavailable: {e}", req.filename));
                    let _ = filexfer_control::send_response(
                        &mut stream,
                        &ControlResponse::Err(format!("file not found: {}", req.filename)),
                    );
                    return;
                }
            };

            let requester = NetAddr::new(req.requester_ip, req.requester_udp_port);
            let data_endpoint = match DatagramEndpoint::bind(NetAddr::new(control_addr.ip, 0), 256) {
                Ok(ep) => ep,
                Err(e) => {
                    log_error(format!("control: could not bind data-plane socket: {e}"));
                    return;
                }
            };
            let udp_port = data_endpoint.local_addr().port;

            let mut manager = FileXferManager::new();
            let session_id = manager.start(requester, file_path, &bytes);

            let _ = filexfer_control::send_response(
                &mut stream,
                &ControlResponse::Ready(DownloadRsp {
                    server_ip: control_addr.ip,
                    udp_port,
                    session_id,
                    file_size: bytes.len() as u64,
                    filename: req.filename.clone(),
                }),
            );

            run_file_transfer_session(data_endpoint, manager, session_id, req.filename);
        });
    }
}

fn run_file_transfer_session(
    endpoint: DatagramEndpoint,
    mut manager: FileXferManager,
    session_id: u32,
    filename: String,
) {
    let mut sink = endpoint.sink();
    loop {
        if let Some(pkt) = endpoint.try_recv() {
            if let Some(session) = manager.get_mut(session_id) {
                session.handle_inbound(&mut sink, &pkt.data, now_millis());
            }
        }
        let Some(session) = manager.get_mut(session_id) else { break };
        match session.pump(&mut sink, now_millis()) {
            SessionStatus::InProgress => thread::sleep(Duration::from_millis(5)),
            SessionStatus::Succeeded => {
                log_info(format!("control: transfer of {filename} to session {session_id} complete"));
                break;
            }
            SessionStatus::Failed => {
                log_dev(format!("control: transfer of {filename} (session {session_id}) failed"));
                break;
            }
        }
    }
}

fn run_client() {
    let file_cfg = load_or_default_config();
    let server_addr = NetAddr::new(file_cfg.server_ip.octets(), file_cfg.server_udp_port);

    let local_port = cli::prompt_client_udp_port();
    let name = cli::prompt_player_name();

    let endpoint = match DatagramEndpoint::bind(NetAddr::new([0, 0, 0, 0], local_port), 1024) {
        Ok(ep) => ep,
        Err(e) => {
            log_error(format!("client: could not bind local socket: {e}"));
            return;
        }
    };
    log_info(format!("client: local socket bound on {}", endpoint.local_addr()));

    let mut client = ast_client::client::GameClient::new(server_addr);
    let mut sink = endpoint.sink();

    client.connect(&mut sink, &name, now_millis());
    client.request_game_start(&mut sink, now_millis());

    loop {
        if let Some(pkt) = endpoint.try_recv() {
            client.handle_inbound(&mut sink, &pkt.data, now_millis());
        }
        if client.tick(&mut sink, now_millis()) {
            break;
        }
        if !client.leaderboard_lines.is_empty() {
            log_info("client: final leaderboard:".to_string());
            for line in &client.leaderboard_lines {
                log_info(format!("  {line}"));
            }
            break;
        }
        thread::sleep(INGEST_POLL);
    }

    if let Some(filename) = cli::prompt_download_filename() {
        download_file(server_addr, endpoint.local_addr().port, &filename);
    }

    client.quit(&mut sink, now_millis());
}

fn download_file(game_addr: NetAddr, local_udp_port: u16, filename: &str) {
    let control_addr = NetAddr::new(game_addr.ip, game_addr.port.wrapping_add(1));
    let response = match filexfer_control::request_download(control_addr, local_udp_port, filename) {
        Ok(r) => r,
        Err(e) => {
            log_error(format!("client: download request failed: {e}"));
            return;
        }
    };

    let rsp = match response {
        ControlResponse::Ready(rsp) => rsp,
        ControlResponse::Err(msg) => {
            log_info(format!("client: download rejected: {msg}"));
            return;
        }
    };

    let data_endpoint = match DatagramEndpoint::bind(NetAddr::new([0, 0, 0, 0], 0), 256) {
        Ok(ep) => ep,
        Err(e) => {
            log_error(format!("client: could not bind data-plane socket: {e}"));
            return;
        }
    };
    let server_data_addr = NetAddr::new(rsp.server_ip, rsp.udp_port);
    let mut sink = data_endpoint.sink();

    let mut session = match ast_client::filexfer::FileReceiveSession::new(
        rsp.session_id,
        server_data_addr,
        PathBuf::from(&rsp.filename),
        rsp.file_size,
    ) {
        Ok(s) => s,
        Err(e) => {
            log_error(format!("client: could not create output file: {e}"));
            return;
        }
    };

    loop {
        let Some(pkt) = data_endpoint.try_recv() else {
            thread::sleep(Duration::from_millis(5));
            continue;
        };
        match session.handle_inbound(&mut sink, &pkt.data, now_millis()) {
            ast_client::filexfer::ReceiveStatus::InProgress => continue,
            ast_client::filexfer::ReceiveStatus::Complete => {
                let _ = session.verify_hash();
                log_info(format!("client: download of {} complete", rsp.filename));
                break;
            }
            ast_client::filexfer::ReceiveStatus::Failed => {
                log_error(format!("client: download of {} failed", rsp.filename));
                break;
            }
        }
    }
}
