use glam::Vec3;

/// Generate smooth per-vertex normals for a triangle list.
///
/// Each triangle contributes its unit face normal to its three vertices;
/// the sums are normalized. Triangles referencing missing vertices are
/// skipped and degenerate triangles contribute nothing.
pub fn smooth_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];

    for triangle in indices.chunks_exact(3) {
        let [i0, i1, i2] = [
            triangle[0] as usize,
            triangle[1] as usize,
            triangle[2] as usize,
        ];
        let (Some(p0), Some(p1), Some(p2)) =
            (positions.get(i0), positions.get(i1), positions.get(i2))
        else {
            continue;
        };
        let n = (*p1 - *p0).cross(*p2 - *p0).normalize_or_zero();
        normals[i0] += n;
        normals[i1] += n;
        normals[i2] += n;
    }

    for n in &mut normals {
        *n = n.normalize_or_zero();
    }
    normals
}
