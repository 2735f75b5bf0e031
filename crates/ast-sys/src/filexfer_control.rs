// filexfer_control.rs — file-transfer control plane (§4.10, SPEC_FULL §11:
// "the one place in the whole core that is not UDP").
//
// A plain blocking `TcpListener`/`TcpStream` exchange: `DOWNLOAD_REQ`
// carries `(requester_ip, requester_udp_port, filename)`; the server
// answers `DOWNLOAD_RSP` with `(server_ip, ephemeral_udp_port, session_id,
// file_size, filename)` or `DOWNLOAD_ERR` if the file is absent. Framed as
// tag byte + u32 length + payload, in the same spirit as the teacher's
// `SizeBuf`-style packed fields but over a byte stream rather than a
// single datagram, since TCP has no natural message boundary.

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};

use ast_common::net_addr::NetAddr;
use ast_common::wire::Command;

#[derive(Debug, Clone)]
pub struct DownloadReq {
    pub requester_ip: [u8; 4],
    pub requester_udp_port: u16,
    pub filename: String,
}

#[derive(Debug, Clone)]
pub struct DownloadRsp {
    pub server_ip: [u8; 4],
    pub udp_port: u16,
    pub session_id: u32,
    pub file_size: u64,
    pub filename: String,
}

#[derive(Debug, Clone)]
pub enum ControlResponse {
    Ready(DownloadRsp),
    Err(String),
}

fn write_framed(stream: &mut impl Write, tag: Command, payload: &[u8]) -> io::Result<()> {
    stream.write_all(&[tag as u8])?;
    stream.write_all(&(payload.len() as u32).to_le_bytes())?;
    stream.write_all(payload)?;
    stream.flush()
}

fn read_framed(stream: &mut impl Read) -> io::Result<(Command, Vec<u8>)> {
    let mut tag_buf = [0u8; 1];
    stream.read_exact(&mut tag_buf)?;
    let tag = Command::from_u8(tag_buf[0])
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "unknown control tag"))?;

    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf)?;
    let len = u32::from_le_bytes(len_buf) as usize;

    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload)?;
    Ok((tag, payload))
}

fn write_string(out: &mut Vec<u8>, s: &str) {
    let bytes = s.as_bytes();
    out.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
    out.extend_from_slice(bytes);
}

fn read_string(buf: &[u8], pos: &mut usize) -> io::Result<String> {
    let err = || io::Error::new(io::ErrorKind::InvalidData, "truncated control message");
    let len_bytes: [u8; 2] = buf.get(*pos..*pos + 2).ok_or_else(err)?.try_into().unwrap();
    let len = u16::from_le_bytes(len_bytes) as usize;
    *pos += 2;
    let bytes = buf.get(*pos..*pos + len).ok_or_else(err)?;
    *pos += len;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

pub fn send_request(stream: &mut TcpStream, req: &DownloadReq) -> io::Result<()> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&req.requester_ip);
    payload.extend_from_slice(&req.requester_udp_port.to_le_bytes());
    write_string(&mut payload, &req.filename);
    write_framed(stream, Command::DownloadReq, &payload)
}

pub fn recv_request(stream: &mut TcpStream) -> io::Result<DownloadReq> {
    let (tag, payload) = read_framed(stream)?;
    if tag != Command::DownloadReq {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "expected DOWNLOAD_REQ"));
    }
    let err = || io::Error::new(io::ErrorKind::InvalidData, "truncated DOWNLOAD_REQ");
    let requester_ip: [u8; 4] = payload.get(0..4).ok_or_else(err)?.try_into().unwrap();
    let port_bytes: [u8; 2] = payload.get(4..6).ok_or_else(err)?.try_into().unwrap();
    let requester_udp_port = u16::from_le_bytes(port_bytes);
    let mut pos = 6;
    let filename = read_string(&payload, &mut pos)?;
    Ok(DownloadReq { requester_ip, requester_udp_port, filename })
}

pub fn send_response(stream: &mut TcpStream, response: &ControlResponse) -> io::Result<()> {
    match response {
        ControlResponse::Ready(rsp) => {
            let mut payload = Vec::new();
            payload.extend_from_slice(&rsp.server_ip);
            payload.extend_from_slice(&rsp.udp_port.to_le_bytes());
            payload.extend_from_slice(&rsp.session_id.to_le_bytes());
            payload.extend_from_slice(&rsp.file_size.to_le_bytes());
            write_string(&mut payload, &rsp.filename);
            write_framed(stream, Command::DownloadRsp, &payload)
        }
        ControlResponse::Err(message) => {
            let mut payload = Vec::new();
            write_string(&mut payload, message);
            write_framed(stream, Command::DownloadErr, &payload)
        }
    }
}

pub fn recv_response(stream: &mut TcpStream) -> io::Result<ControlResponse> {
    let (tag, payload) = read_framed(stream)?;
    let err = || io::Error::new(io::ErrorKind::InvalidData, "truncated control response");
    match tag {
        Command::DownloadRsp => {
            let server_ip: [u8; 4] = payload.get(0..4).ok_or_else(err)?.try_into().unwrap();
            let udp_port = u16::from_le_bytes(payload.get(4..6).ok_or_else(err)?.try_into().unwrap());
            let session_id = u32::from_le_bytes(payload.get(6..10).ok_or_else(err)?.try_into().unwrap());
            let file_size = u64::from_le_bytes(payload.get(10..18).ok_or_else(err)?.try_into().unwrap());
            let mut pos = 18;
            let filename = read_string(&payload, &mut pos)?;
            Ok(ControlResponse::Ready(DownloadRsp { server_ip, udp_port, session_id, file_size, filename }))
        }
        Command::DownloadErr => {
            let mut pos = 0;
            let message = read_string(&payload, &mut pos)?;
            Ok(ControlResponse::Err(message))
        }
        _ => Err(io::Error::new(io::ErrorKind::InvalidData, "expected DOWNLOAD_RSP or DOWNLOAD_ERR")),
    }
}

/// Client-side convenience: connect, send the request, read back the
/// response, one TCP round trip per download (§4.10).
pub fn request_download(
    control_addr: NetAddr,
    requester_udp_port: u16,
    filename: &str,
) -> io::Result<ControlResponse> {
    let mut stream = TcpStream::connect(std::net::SocketAddr::from(control_addr))?;
    let req = DownloadReq {
        requester_ip: control_addr.ip,
        requester_udp_port,
        filename: filename.to_string(),
    };
    send_request(&mut stream, &req)?;
    recv_response(&mut stream)
}

/// Server-side convenience: accept exactly one connection off `listener`,
/// hand the parsed request to `handle`, and write back whatever it
/// decides (a `Ready` session descriptor or an `Err`).
pub fn accept_and_handle(
    listener: &TcpListener,
    handle: impl FnOnce(DownloadReq) -> ControlResponse,
) -> io::Result<()> {
    let (mut stream, _peer) = listener.accept()?;
    let req = recv_request(&mut stream)?;
    let response = handle(req);
    send_response(&mut stream, &response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn request_roundtrips_over_a_loopback_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let control_addr: NetAddr = listener.local_addr().unwrap().try_into().unwrap();

        let server = thread::spawn(move || {
            accept_and_handle(&listener, |req| {
                assert_eq!(req.filename, "leaderboard.bin");
                ControlResponse::Ready(DownloadRsp {
                    server_ip: [127, 0, 0, 1],
                    udp_port: 9600,
                    session_id: 1,
                    file_size: 42,
                    filename: req.filename,
                })
            })
        });

        let response = request_download(control_addr, 9001, "leaderboard.bin").unwrap();
        server.join().unwrap();

        match response {
            ControlResponse::Ready(rsp) => {
                assert_eq!(rsp.udp_port, 9600);
                assert_eq!(rsp.file_size, 42);
            }
            ControlResponse::Err(e) => panic!("unexpected error response: {e}"),
        }
    }

    #[test]
    fn missing_file_yields_err_response() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let control_addr: NetAddr = listener.local_addr().unwrap().try_into().unwrap();

        let server = thread::spawn(move || {
            accept_and_handle(&listener, |_req| ControlResponse::Err("file missing".to_string()))
        });

        let response = request_download(control_addr, 9001, "nope.bin").unwrap();
        server.join().unwrap();

        assert!(matches!(response, ControlResponse::Err(_)));
    }
}
