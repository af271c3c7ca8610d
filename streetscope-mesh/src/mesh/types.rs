// Reconstruction meshes are a flat triangle soup: vertex positions as xyz
// triplets and faces as index triplets into the vertex list.

pub const FOURCC_MESH: u32 = 0x4D534D53; // "SMSM"
pub const MESH_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshAsset {
    pub vertices: Vec<f32>,
    pub faces: Vec<u32>,
}

impl MeshAsset {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }

    pub fn face_count(&self) -> usize {
        self.faces.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }
}
