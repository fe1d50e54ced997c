//! STL file parser for binary and ASCII formats.
//!
//! Facet normals stored in the file are kept on the vertices but the render
//! geometry recomputes its own (see [`crate::Geometry`]).
use nom::{
    bytes::complete::tag,
    character::complete::{multispace0, multispace1, not_line_ending},
    multi::many0,
    number::complete::float,
    sequence::preceded,
    IResult,
};

use crate::error::ParseError;
use crate::geometry::{Mesh, Triangle, Vertex};

/// Binary header size in bytes.
const HEADER_SIZE: usize = 80;

/// Size of one binary facet (normal + 3 vertices + attribute count).
const FACET_SIZE: usize = 50;

/// Parse a binary STL file
pub fn parse_binary_stl(data: &[u8]) -> Result<Mesh, ParseError> {
    if data.len() < HEADER_SIZE + 4 {
        return Err(ParseError::InvalidHeader {
            expected: HEADER_SIZE + 4,
            got: data.len(),
        });
    }

    let faces = read_u32(&data[HEADER_SIZE..]);
    let expected = binary_len(faces);
    if data.len() < expected {
        return Err(ParseError::Truncated {
            faces,
            expected,
            got: data.len(),
        });
    }

    let body = &data[HEADER_SIZE + 4..expected];
    let mut mesh = Mesh::with_capacity(faces as usize);

    for facet in body.chunks_exact(FACET_SIZE) {
        let [nx, ny, nz] = read_vec3(&facet[0..12]);
        let vertex = |at: usize| {
            let [x, y, z] = read_vec3(&facet[at..at + 12]);
            Vertex::new(x, y, z, nx, ny, nz)
        };
        // Attribute byte count (last 2 bytes) is ignored
        mesh.add_triangle(Triangle::new(vertex(12), vertex(24), vertex(36)));
    }

    Ok(mesh)
}

fn binary_len(faces: u32) -> usize {
    (faces as usize)
        .saturating_mul(FACET_SIZE)
        .saturating_add(HEADER_SIZE + 4)
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn read_vec3(bytes: &[u8]) -> [f32; 3] {
    let f = |i: usize| f32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
    [f(0), f(4), f(8)]
}

/// Parse an ASCII STL file
pub fn parse_ascii_stl(input: &str) -> Result<Mesh, ParseError> {
    match parse_ascii_stl_impl(input) {
        Ok((_, mesh)) => Ok(mesh),
        Err(e) => Err(ParseError::Ascii(describe(e))),
    }
}

fn describe(err: nom::Err<nom::error::Error<&str>>) -> String {
    match err {
        nom::Err::Incomplete(_) => "unexpected end of input".to_string(),
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let near: String = e.input.chars().take(24).collect();
            format!("{:?} near {:?}", e.code, near.trim())
        }
    }
}

fn parse_ascii_stl_impl(input: &str) -> IResult<&str, Mesh> {
    let (input, _) = preceded(multispace0, tag("solid"))(input)?;
    let (input, _) = not_line_ending(input)?; // Optional name
    let (input, triangles) = many0(parse_facet)(input)?;
    let (input, _) = preceded(multispace0, tag("endsolid"))(input)?;
    let (input, _) = not_line_ending(input)?;

    let mut mesh = Mesh::with_capacity(triangles.len());
    for triangle in triangles {
        mesh.add_triangle(triangle);
    }

    Ok((input, mesh))
}

fn parse_facet(input: &str) -> IResult<&str, Triangle> {
    let (input, _) = preceded(multispace0, tag("facet"))(input)?;
    let (input, _) = preceded(multispace1, tag("normal"))(input)?;
    let (input, normal) = parse_vector3(input)?;
    let (input, _) = preceded(multispace0, tag("outer"))(input)?;
    let (input, _) = preceded(multispace1, tag("loop"))(input)?;
    let (input, v1) = parse_vertex(input, normal)?;
    let (input, v2) = parse_vertex(input, normal)?;
    let (input, v3) = parse_vertex(input, normal)?;
    let (input, _) = preceded(multispace0, tag("endloop"))(input)?;
    let (input, _) = preceded(multispace0, tag("endfacet"))(input)?;

    Ok((input, Triangle::new(v1, v2, v3)))
}

fn parse_vertex(input: &str, normal: (f32, f32, f32)) -> IResult<&str, Vertex> {
    let (input, _) = preceded(multispace0, tag("vertex"))(input)?;
    let (input, (x, y, z)) = parse_vector3(input)?;
    Ok((input, Vertex::new(x, y, z, normal.0, normal.1, normal.2)))
}

fn parse_vector3(input: &str) -> IResult<&str, (f32, f32, f32)> {
    let (input, _) = multispace0(input)?;
    let (input, x) = float(input)?;
    let (input, _) = multispace1(input)?;
    let (input, y) = float(input)?;
    let (input, _) = multispace1(input)?;
    let (input, z) = float(input)?;
    Ok((input, (x, y, z)))
}

/// Whether the bytes look like an ASCII body: a `solid` keyword followed by
/// a `facet` or `endsolid` keyword.
fn looks_ascii(data: &[u8]) -> bool {
    let head = String::from_utf8_lossy(&data[..data.len().min(512)]);
    let head = head.trim_start();
    head.starts_with("solid") && (head.contains("facet") || head.contains("endsolid"))
}

/// Detect and parse an STL file (binary or ASCII), rejecting meshes without
/// triangles or with non-finite coordinates.
pub fn parse_stl(data: &[u8]) -> Result<Mesh, ParseError> {
    // A binary file whose length matches its face count wins even when the
    // header happens to start with "solid"
    let exact_binary = data.len() >= HEADER_SIZE + 4
        && binary_len(read_u32(&data[HEADER_SIZE..])) == data.len();

    let mesh = if !exact_binary && looks_ascii(data) {
        let text = std::str::from_utf8(data)
            .map_err(|e| ParseError::Ascii(format!("invalid UTF-8: {e}")))?;
        parse_ascii_stl(text)?
    } else {
        parse_binary_stl(data)?
    };

    if mesh.triangles.is_empty() {
        return Err(ParseError::Empty);
    }
    if let Some(face) = mesh.triangles.iter().position(|t| {
        t.vertices
            .iter()
            .any(|v| !v.position.coords.iter().all(|c| c.is_finite()))
    }) {
        return Err(ParseError::NonFinite { face });
    }

    Ok(mesh)
}

/// Serialize a mesh as binary STL. Used to produce fixtures and by callers
/// that re-export decoded meshes.
pub fn write_binary_stl(mesh: &Mesh) -> Vec<u8> {
    let mut out = Vec::with_capacity(binary_len(mesh.triangles.len() as u32));
    out.extend_from_slice(&[0u8; HEADER_SIZE]);
    out.extend_from_slice(&(mesh.triangles.len() as u32).to_le_bytes());
    for tri in &mesh.triangles {
        let n = tri.calculate_normal();
        for c in n.iter() {
            out.extend_from_slice(&c.to_le_bytes());
        }
        for v in &tri.vertices {
            for c in v.position.coords.iter() {
                out.extend_from_slice(&c.to_le_bytes());
            }
        }
        out.extend_from_slice(&0u16.to_le_bytes());
    }
    out
}
