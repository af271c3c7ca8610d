use crate::ParserError;
use crate::mesh::types::{FOURCC_MESH, MESH_VERSION, MeshAsset};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Read;

// Payloads come off the network, so element counts are capped before any
// allocation happens.
const MAX_ELEMENTS: usize = 1 << 24;

pub struct MeshReader {}

impl MeshReader {
    pub fn parse_asset<R: Read>(rdr: &mut R) -> Result<MeshAsset, ParserError> {
        let magic = rdr.read_u32::<LittleEndian>()?;
        if magic != FOURCC_MESH {
            return Err(ParserError::InvalidMagicValue { magic });
        }

        let version = rdr.read_u32::<LittleEndian>()?;
        if version != MESH_VERSION {
            return Err(ParserError::UnsupportedVersion { version });
        }

        let vertex_count = rdr.read_u32::<LittleEndian>()? as usize;
        let face_count = rdr.read_u32::<LittleEndian>()? as usize;
        if vertex_count > MAX_ELEMENTS || face_count > MAX_ELEMENTS {
            return Err(ParserError::FormatError {
                reason: "element count exceeds the payload limits",
            });
        }

        let mut vertices = vec![0.0f32; vertex_count * 3];
        rdr.read_f32_into::<LittleEndian>(&mut vertices)?;

        let mut faces = vec![0u32; face_count * 3];
        rdr.read_u32_into::<LittleEndian>(&mut faces)?;

        if faces.iter().any(|&index| index as usize >= vertex_count) {
            return Err(ParserError::FormatError {
                reason: "face index out of vertex range",
            });
        }

        Ok(MeshAsset { vertices, faces })
    }
}
