#![allow(dead_code)]

use std::f32::consts::PI;
use std::net::SocketAddr;

use thumb3d_core::stl::write_binary_stl;
use thumb3d_core::{Mesh, Triangle, Vertex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn sphere_vertex(radius: f32, theta: f32, phi: f32) -> Vertex {
    let (x, y, z) = (theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin());
    Vertex::new(radius * x, radius * y, radius * z, x, y, z)
}

/// UV sphere centered on the origin
pub fn sphere_mesh(radius: f32, rings: usize, segments: usize) -> Mesh {
    let mut mesh = Mesh::new();
    for i in 0..rings {
        let (t0, t1) = (PI * i as f32 / rings as f32, PI * (i + 1) as f32 / rings as f32);
        for j in 0..segments {
            let p0 = 2.0 * PI * j as f32 / segments as f32;
            let p1 = 2.0 * PI * (j + 1) as f32 / segments as f32;

            let a = sphere_vertex(radius, t0, p0);
            let b = sphere_vertex(radius, t1, p0);
            let c = sphere_vertex(radius, t1, p1);
            let d = sphere_vertex(radius, t0, p1);

            if i + 1 < rings {
                mesh.add_triangle(Triangle::new(a, b, c));
            }
            if i > 0 {
                mesh.add_triangle(Triangle::new(a, c, d));
            }
        }
    }
    mesh
}

pub fn unit_sphere_stl() -> Vec<u8> {
    write_binary_stl(&sphere_mesh(1.0, 16, 32))
}

/// Serve exactly one HTTP response on a loopback port and return the address
pub async fn serve_once(status: &'static str, body: Vec<u8>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }

        let head = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/octet-stream\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(&body).await.unwrap();
        socket.shutdown().await.unwrap();
    });

    addr
}
