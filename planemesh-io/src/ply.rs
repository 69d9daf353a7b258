//! PLY format support
//!
//! A targeted PLY reader and writer for triangle meshes:
//! - ASCII and binary (little/big endian) reading
//! - vertex positions as float or double, extra properties skipped
//! - strictly triangular faces (anything else is rejected)
//! - ASCII or binary little-endian writing with optional per-face colors

use crate::{MeshReader, MeshWriter};
use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use planemesh_core::{Error, Point3, Result, TriangleMesh};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// PLY file format variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlyFormat {
    Ascii,
    BinaryLittleEndian,
    BinaryBigEndian,
}

/// Scalar property types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScalarType {
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Float,
    Double,
}

impl ScalarType {
    fn parse(s: &str) -> Result<Self> {
        Ok(match s {
            "char" | "int8" => ScalarType::Char,
            "uchar" | "uint8" => ScalarType::UChar,
            "short" | "int16" => ScalarType::Short,
            "ushort" | "uint16" => ScalarType::UShort,
            "int" | "int32" => ScalarType::Int,
            "uint" | "uint32" => ScalarType::UInt,
            "float" | "float32" => ScalarType::Float,
            "double" | "float64" => ScalarType::Double,
            other => {
                return Err(Error::InvalidData(format!(
                    "unknown PLY property type '{}'",
                    other
                )))
            }
        })
    }
}

#[derive(Debug, Clone)]
enum PropertyKind {
    Scalar(ScalarType),
    List(ScalarType, ScalarType),
}

#[derive(Debug, Clone)]
struct Property {
    name: String,
    kind: PropertyKind,
}

#[derive(Debug, Clone)]
struct Element {
    name: String,
    count: usize,
    properties: Vec<Property>,
}

#[derive(Debug, Clone)]
struct Header {
    format: PlyFormat,
    elements: Vec<Element>,
}

/// PLY mesh reader
pub struct PlyReader;

/// PLY mesh writer
pub struct PlyWriter;

impl MeshReader for PlyReader {
    fn read_mesh<P: AsRef<Path>>(path: P) -> Result<TriangleMesh> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }
}

impl PlyReader {
    /// Read a triangle mesh from any buffered reader.
    pub fn read_from<R: BufRead>(reader: &mut R) -> Result<TriangleMesh> {
        let header = Self::read_header(reader)?;
        let mut mesh = TriangleMesh::new();

        for element in &header.elements {
            match element.name.as_str() {
                "vertex" => Self::read_vertices(reader, &header, element, &mut mesh)?,
                "face" => Self::read_faces(reader, &header, element, &mut mesh)?,
                _ => Self::skip_element(reader, &header, element)?,
            }
        }
        Ok(mesh)
    }

    fn read_header<R: BufRead>(reader: &mut R) -> Result<Header> {
        let mut line = String::new();
        reader.read_line(&mut line)?;
        if line.trim() != "ply" {
            return Err(Error::InvalidData(
                "not a PLY file - missing magic number".to_string(),
            ));
        }

        let mut format = None;
        let mut elements: Vec<Element> = Vec::new();
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                return Err(Error::InvalidData(
                    "unexpected end of file in PLY header".to_string(),
                ));
            }
            let line = line.trim();
            if line == "end_header" {
                break;
            }
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.is_empty() {
                continue;
            }
            match parts[0] {
                "comment" | "obj_info" => {}
                "format" => {
                    if parts.len() < 3 {
                        return Err(Error::InvalidData("invalid PLY format line".to_string()));
                    }
                    format = Some(match parts[1] {
                        "ascii" => PlyFormat::Ascii,
                        "binary_little_endian" => PlyFormat::BinaryLittleEndian,
                        "binary_big_endian" => PlyFormat::BinaryBigEndian,
                        other => {
                            return Err(Error::InvalidData(format!(
                                "unknown PLY format '{}'",
                                other
                            )))
                        }
                    });
                }
                "element" => {
                    if parts.len() < 3 {
                        return Err(Error::InvalidData("invalid PLY element line".to_string()));
                    }
                    let count = parts[2].parse::<usize>().map_err(|_| {
                        Error::InvalidData(format!("invalid element count '{}'", parts[2]))
                    })?;
                    elements.push(Element {
                        name: parts[1].to_string(),
                        count,
                        properties: Vec::new(),
                    });
                }
                "property" => {
                    let element = elements.last_mut().ok_or_else(|| {
                        Error::InvalidData("property before any element".to_string())
                    })?;
                    if parts.len() >= 5 && parts[1] == "list" {
                        element.properties.push(Property {
                            name: parts[4].to_string(),
                            kind: PropertyKind::List(
                                ScalarType::parse(parts[2])?,
                                ScalarType::parse(parts[3])?,
                            ),
                        });
                    } else if parts.len() >= 3 {
                        element.properties.push(Property {
                            name: parts[2].to_string(),
                            kind: PropertyKind::Scalar(ScalarType::parse(parts[1])?),
                        });
                    } else {
                        return Err(Error::InvalidData("invalid PLY property line".to_string()));
                    }
                }
                _ => {}
            }
        }

        let format = format
            .ok_or_else(|| Error::InvalidData("PLY header missing format line".to_string()))?;
        Ok(Header { format, elements })
    }

    fn read_vertices<R: BufRead>(
        reader: &mut R,
        header: &Header,
        element: &Element,
        mesh: &mut TriangleMesh,
    ) -> Result<()> {
        mesh.vertices.reserve(element.count);
        for _ in 0..element.count {
            let row = Self::read_row(reader, header.format, element)?;
            let mut pos = [0.0f64; 3];
            for (prop, values) in element.properties.iter().zip(&row) {
                match prop.name.as_str() {
                    "x" => pos[0] = values[0],
                    "y" => pos[1] = values[0],
                    "z" => pos[2] = values[0],
                    _ => {}
                }
            }
            mesh.vertices.push(Point3::new(pos[0], pos[1], pos[2]));
        }
        Ok(())
    }

    fn read_faces<R: BufRead>(
        reader: &mut R,
        header: &Header,
        element: &Element,
        mesh: &mut TriangleMesh,
    ) -> Result<()> {
        mesh.faces.reserve(element.count);
        for fi in 0..element.count {
            let row = Self::read_row(reader, header.format, element)?;
            let mut indices: Option<&Vec<f64>> = None;
            for (prop, values) in element.properties.iter().zip(&row) {
                if prop.name == "vertex_indices" || prop.name == "vertex_index" {
                    indices = Some(values);
                }
            }
            let indices = indices.ok_or_else(|| {
                Error::InvalidData("face element has no vertex_indices property".to_string())
            })?;
            if indices.len() != 3 {
                return Err(Error::InvalidData(format!(
                    "face {} has {} vertices, only triangles are supported",
                    fi,
                    indices.len()
                )));
            }
            mesh.faces.push([
                indices[0] as usize,
                indices[1] as usize,
                indices[2] as usize,
            ]);
        }
        Ok(())
    }

    fn skip_element<R: BufRead>(
        reader: &mut R,
        header: &Header,
        element: &Element,
    ) -> Result<()> {
        for _ in 0..element.count {
            Self::read_row(reader, header.format, element)?;
        }
        Ok(())
    }

    /// Read one element row as a vector of property values (scalars become
    /// one-element vectors, lists keep their payload).
    fn read_row<R: BufRead>(
        reader: &mut R,
        format: PlyFormat,
        element: &Element,
    ) -> Result<Vec<Vec<f64>>> {
        match format {
            PlyFormat::Ascii => {
                let mut line = String::new();
                if reader.read_line(&mut line)? == 0 {
                    return Err(Error::InvalidData(
                        "unexpected end of file in PLY body".to_string(),
                    ));
                }
                let mut tokens = line.split_whitespace();
                let mut next = |ctx: &str| -> Result<f64> {
                    tokens
                        .next()
                        .ok_or_else(|| Error::InvalidData(format!("missing {} value", ctx)))?
                        .parse::<f64>()
                        .map_err(|_| Error::InvalidData(format!("invalid {} value", ctx)))
                };
                let mut row = Vec::with_capacity(element.properties.len());
                for prop in &element.properties {
                    match prop.kind {
                        PropertyKind::Scalar(_) => row.push(vec![next(&prop.name)?]),
                        PropertyKind::List(_, _) => {
                            let n = next(&prop.name)? as usize;
                            let mut values = Vec::with_capacity(n);
                            for _ in 0..n {
                                values.push(next(&prop.name)?);
                            }
                            row.push(values);
                        }
                    }
                }
                Ok(row)
            }
            PlyFormat::BinaryLittleEndian => Self::read_binary_row::<R, LittleEndian>(reader, element),
            PlyFormat::BinaryBigEndian => Self::read_binary_row::<R, BigEndian>(reader, element),
        }
    }

    fn read_binary_row<R: BufRead, B: byteorder::ByteOrder>(
        reader: &mut R,
        element: &Element,
    ) -> Result<Vec<Vec<f64>>> {
        let mut row = Vec::with_capacity(element.properties.len());
        for prop in &element.properties {
            match prop.kind {
                PropertyKind::Scalar(t) => row.push(vec![Self::read_scalar::<R, B>(reader, t)?]),
                PropertyKind::List(count_t, item_t) => {
                    let n = Self::read_scalar::<R, B>(reader, count_t)? as usize;
                    let mut values = Vec::with_capacity(n);
                    for _ in 0..n {
                        values.push(Self::read_scalar::<R, B>(reader, item_t)?);
                    }
                    row.push(values);
                }
            }
        }
        Ok(row)
    }

    fn read_scalar<R: BufRead, B: byteorder::ByteOrder>(
        reader: &mut R,
        t: ScalarType,
    ) -> Result<f64> {
        Ok(match t {
            ScalarType::Char => reader.read_i8()? as f64,
            ScalarType::UChar => reader.read_u8()? as f64,
            ScalarType::Short => reader.read_i16::<B>()? as f64,
            ScalarType::UShort => reader.read_u16::<B>()? as f64,
            ScalarType::Int => reader.read_i32::<B>()? as f64,
            ScalarType::UInt => reader.read_u32::<B>()? as f64,
            ScalarType::Float => reader.read_f32::<B>()? as f64,
            ScalarType::Double => reader.read_f64::<B>()?,
        })
    }
}

/// Options for PLY writing
#[derive(Debug, Clone)]
pub struct PlyWriteOptions {
    pub format: PlyFormat,
    pub comments: Vec<String>,
    /// One RGB triple per face, written as uchar properties
    pub face_colors: Option<Vec<[u8; 3]>>,
}

impl Default for PlyWriteOptions {
    fn default() -> Self {
        Self {
            format: PlyFormat::BinaryLittleEndian,
            comments: Vec::new(),
            face_colors: None,
        }
    }
}

impl PlyWriteOptions {
    pub fn ascii() -> Self {
        Self {
            format: PlyFormat::Ascii,
            ..Default::default()
        }
    }

    pub fn binary_little_endian() -> Self {
        Self::default()
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comments.push(comment.to_string());
        self
    }

    pub fn with_face_colors(mut self, colors: Vec<[u8; 3]>) -> Self {
        self.face_colors = Some(colors);
        self
    }
}

impl MeshWriter for PlyWriter {
    fn write_mesh<P: AsRef<Path>>(mesh: &TriangleMesh, path: P) -> Result<()> {
        Self::write_mesh_with(mesh, path, &PlyWriteOptions::default())
    }
}

impl PlyWriter {
    pub fn write_mesh_with<P: AsRef<Path>>(
        mesh: &TriangleMesh,
        path: P,
        options: &PlyWriteOptions,
    ) -> Result<()> {
        if let Some(colors) = &options.face_colors {
            if colors.len() != mesh.face_count() {
                return Err(Error::InvalidData(format!(
                    "{} face colors for {} faces",
                    colors.len(),
                    mesh.face_count()
                )));
            }
        }
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_header(&mut writer, mesh, options)?;
        match options.format {
            PlyFormat::Ascii => Self::write_body_ascii(&mut writer, mesh, options)?,
            PlyFormat::BinaryLittleEndian => Self::write_body_binary(&mut writer, mesh, options)?,
            PlyFormat::BinaryBigEndian => {
                return Err(Error::UnsupportedFormat(
                    "binary big-endian PLY writing is not supported".to_string(),
                ))
            }
        }
        writer.flush()?;
        Ok(())
    }

    fn write_header<W: Write>(
        writer: &mut W,
        mesh: &TriangleMesh,
        options: &PlyWriteOptions,
    ) -> Result<()> {
        writeln!(writer, "ply")?;
        match options.format {
            PlyFormat::Ascii => writeln!(writer, "format ascii 1.0")?,
            PlyFormat::BinaryLittleEndian => writeln!(writer, "format binary_little_endian 1.0")?,
            PlyFormat::BinaryBigEndian => writeln!(writer, "format binary_big_endian 1.0")?,
        }
        for comment in &options.comments {
            writeln!(writer, "comment {}", comment)?;
        }
        writeln!(writer, "element vertex {}", mesh.vertex_count())?;
        writeln!(writer, "property double x")?;
        writeln!(writer, "property double y")?;
        writeln!(writer, "property double z")?;
        writeln!(writer, "element face {}", mesh.face_count())?;
        writeln!(writer, "property list uchar int vertex_indices")?;
        if options.face_colors.is_some() {
            writeln!(writer, "property uchar red")?;
            writeln!(writer, "property uchar green")?;
            writeln!(writer, "property uchar blue")?;
        }
        writeln!(writer, "end_header")?;
        Ok(())
    }

    fn write_body_ascii<W: Write>(
        writer: &mut W,
        mesh: &TriangleMesh,
        options: &PlyWriteOptions,
    ) -> Result<()> {
        for v in &mesh.vertices {
            writeln!(writer, "{} {} {}", v.x, v.y, v.z)?;
        }
        for (fi, face) in mesh.faces.iter().enumerate() {
            write!(writer, "3 {} {} {}", face[0], face[1], face[2])?;
            if let Some(colors) = &options.face_colors {
                let [r, g, b] = colors[fi];
                write!(writer, " {} {} {}", r, g, b)?;
            }
            writeln!(writer)?;
        }
        Ok(())
    }

    fn write_body_binary<W: Write>(
        writer: &mut W,
        mesh: &TriangleMesh,
        options: &PlyWriteOptions,
    ) -> Result<()> {
        for v in &mesh.vertices {
            writer.write_f64::<LittleEndian>(v.x)?;
            writer.write_f64::<LittleEndian>(v.y)?;
            writer.write_f64::<LittleEndian>(v.z)?;
        }
        for (fi, face) in mesh.faces.iter().enumerate() {
            writer.write_u8(3)?;
            for &vi in face {
                writer.write_i32::<LittleEndian>(vi as i32)?;
            }
            if let Some(colors) = &options.face_colors {
                for c in colors[fi] {
                    writer.write_u8(c)?;
                }
            }
        }
        Ok(())
    }
}
