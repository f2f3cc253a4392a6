//! Quad construction.
//!
//! All builders take render-area coordinates (+Y down) and produce device
//! vertices: Y negated, every position shifted by -0.5 so pixel edges land
//! on texel centres. UVs are scaled by the texture's width/height ratio so
//! the padding of power-of-two textures is never sampled.

use glam::{vec3, Mat4};

use super::Vertex;
use crate::coords::{ColorRgba, DrawRect, Rect};

const HALF_PIXEL: f32 = 0.5;

/// UV extent of the used part of a texture.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct UvExtent {
    pub u: f32,
    pub v: f32,
}

impl UvExtent {
    pub const FULL: UvExtent = UvExtent { u: 1.0, v: 1.0 };

    pub const fn new(u: f32, v: f32) -> Self {
        Self { u, v }
    }
}

/// Packs a tint to ARGB: components capped at 1, alpha scaled by
/// `global_alpha`.
#[inline]
pub fn pack_argb(color: ColorRgba, global_alpha: f32) -> u32 {
    color.clamp_max().to_argb(global_alpha)
}

#[inline]
fn corners(
    rx1: f32,
    ry1: f32,
    rx2: f32,
    ry2: f32,
    z: f32,
    uv: [f32; 4],
    colors: [u32; 4],
) -> [Vertex; 4] {
    let [u1, v1, u2, v2] = uv;
    let (x1, x2) = (rx1 - HALF_PIXEL, rx2 - HALF_PIXEL);
    let (y1, y2) = (-(ry1 - HALF_PIXEL), -(ry2 - HALF_PIXEL));
    [
        Vertex::new(x1, y1, z, u1, v1, colors[0]),
        Vertex::new(x1, y2, z, u1, v2, colors[1]),
        Vertex::new(x2, y2, z, u2, v2, colors[2]),
        Vertex::new(x2, y1, z, u2, v1, colors[3]),
    ]
}

/// Quad for `dst` clipped against `bounds`.
///
/// The UV rectangle shrinks with the visible fraction. `mirrored` negates
/// the U coordinates and leaves the geometry alone. Returns `None` when
/// nothing is visible.
pub fn textured_quad(
    dst: DrawRect,
    bounds: Rect,
    extent: UvExtent,
    color: u32,
    mirrored: bool,
    z: f32,
) -> Option<[Vertex; 4]> {
    let r = dst.rect;
    if r.w == 0.0 || r.h == 0.0 {
        return None;
    }

    let u1 = ((bounds.x - r.x) / r.w * extent.u).max(0.0);
    let u2 = ((bounds.right() - r.x) / r.w * extent.u).min(extent.u);
    let v1 = ((bounds.y - r.y) / r.h * extent.v).max(0.0);
    let v2 = ((bounds.bottom() - r.y) / r.h * extent.v).min(extent.v);

    let rx1 = r.x.max(bounds.x);
    let rx2 = r.right().min(bounds.right());
    let ry1 = r.y.max(bounds.y);
    let ry2 = r.bottom().min(bounds.bottom());
    if rx2 <= rx1 || ry2 <= ry1 {
        return None;
    }

    let (u1, u2) = if mirrored { (-u1, -u2) } else { (u1, u2) };
    Some(corners(rx1, ry1, rx2, ry2, z, [u1, v1, u2, v2], [color; 4]))
}

/// Horizontal slice `[begin, end]` (fractions of the width) of a texture
/// drawn into the same slice of `dst`. Not clipped.
pub fn section_quad(
    dst: DrawRect,
    extent: UvExtent,
    color: u32,
    begin: f32,
    end: f32,
    z: f32,
) -> [Vertex; 4] {
    let r = dst.rect;
    let rx1 = r.x + begin * r.w;
    let rx2 = r.x + end * r.w;
    let uv = [begin * extent.u, 0.0, end * extent.u, extent.v];
    corners(rx1, r.y, rx2, r.bottom(), z, uv, [color; 4])
}

/// Vertically flipped copy of `dst` placed `space` pixels below it, fading
/// from the tint's alpha at the top to zero at `height` pixels down.
///
/// `height` is capped at the bounds height. Returns `None` for empty
/// rectangles, a transparent tint or when `dst` lies outside `bounds`.
pub fn reflection_quad(
    dst: DrawRect,
    bounds: Rect,
    extent: UvExtent,
    color: ColorRgba,
    global_alpha: f32,
    space: f32,
    height: f32,
    z: f32,
) -> Option<[Vertex; 4]> {
    let r = dst.rect;
    if r.w == 0.0 || r.h == 0.0 || bounds.w == 0.0 || bounds.h == 0.0 {
        return None;
    }
    if color.a == 0.0 || height <= 0.0 {
        return None;
    }
    // Touching edges still count as overlap here.
    if bounds.x > r.right()
        || bounds.right() < r.x
        || bounds.y > r.bottom()
        || bounds.bottom() < r.y
    {
        return None;
    }

    let height = height.min(bounds.h);

    let u1 = ((bounds.x - r.x) / r.w * extent.u).max(0.0);
    let u2 = ((bounds.right() - r.x) / r.w * extent.u).min(extent.u);
    let v1 = ((bounds.y - r.y + r.h - height) / r.h * extent.v).max(0.0);
    let v2 = ((bounds.bottom() - r.y) / r.h * extent.v).min(extent.v);

    let rx1 = r.x.max(bounds.x);
    let rx2 = r.right().min(bounds.right());
    let ry1 = (r.bottom() + space).max(bounds.y + space);
    let ry2 = (r.bottom() + space + height).min(bounds.bottom() + space + height);

    let top = pack_argb(color, global_alpha);
    let bottom = pack_argb(color.with_alpha(0.0), global_alpha);

    // Top edge samples the texture's bottom row.
    Some(corners(rx1, ry1, rx2, ry2, z, [u1, v2, u2, v1], [top, bottom, bottom, top]))
}

/// World transform for a quad rotated by `degrees` (clockwise on screen)
/// around the centre of its own, already clipped, vertices.
pub fn rotation_transform(origin: Mat4, degrees: f32, quad: &[Vertex; 4]) -> Mat4 {
    if degrees == 0.0 {
        return origin;
    }

    let [x1, y1, _] = quad[0].position;
    let [x2, y2, _] = quad[2].position;
    let pivot = vec3((x1 + x2) / 2.0, (y1 + y2) / 2.0, 0.0);

    origin
        * Mat4::from_translation(pivot)
        * Mat4::from_rotation_z(-degrees.to_radians())
        * Mat4::from_translation(-pivot)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: u32 = 0xFFFF_FFFF;
    const SCREEN: Rect = Rect::new(0.0, 0.0, 1280.0, 720.0);

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn unclipped_quad_has_half_pixel_shift_and_flipped_y() {
        let rect = DrawRect::new(10.0, 20.0, 100.0, 50.0);
        let q = textured_quad(rect, SCREEN, UvExtent::FULL, WHITE, false, 0.0).unwrap();
        assert_eq!(q[0].position, [9.5, -19.5, 0.0]);
        assert_eq!(q[2].position, [109.5, -69.5, 0.0]);
        assert_eq!((q[0].uv, q[2].uv), ([0.0, 0.0], [1.0, 1.0]));
    }

    #[test]
    fn clipping_shrinks_uvs_proportionally() {
        let bounds = Rect::new(50.0, 0.0, 100.0, 100.0);
        let rect = DrawRect::new(0.0, 0.0, 100.0, 100.0);
        let q = textured_quad(rect, bounds, UvExtent::new(0.5, 1.0), WHITE, false, 0.0).unwrap();
        assert_eq!(q[0].position[0], 49.5);
        assert_eq!(q[3].position[0], 99.5);
        assert!(close(q[0].uv[0], 0.25));
        assert!(close(q[3].uv[0], 0.5));
    }

    #[test]
    fn mirrored_negates_u_only() {
        let rect = DrawRect::new(0.0, 0.0, 10.0, 10.0);
        let plain = textured_quad(rect, SCREEN, UvExtent::FULL, WHITE, false, 0.0).unwrap();
        let flip = textured_quad(rect, SCREEN, UvExtent::FULL, WHITE, true, 0.0).unwrap();
        for i in 0..4 {
            assert_eq!(plain[i].position, flip[i].position);
            assert_eq!(plain[i].uv[1], flip[i].uv[1]);
            assert_eq!(flip[i].uv[0], -plain[i].uv[0]);
        }
        assert_eq!(flip[2].uv[0], -1.0);
    }

    #[test]
    fn fully_clipped_or_empty_is_skipped() {
        let off = DrawRect::new(2000.0, 0.0, 10.0, 10.0);
        assert!(textured_quad(off, SCREEN, UvExtent::FULL, WHITE, false, 0.0).is_none());
        let empty = DrawRect::new(0.0, 0.0, 0.0, 10.0);
        assert!(textured_quad(empty, SCREEN, UvExtent::FULL, WHITE, false, 0.0).is_none());
    }

    #[test]
    fn section_covers_slice() {
        let rect = DrawRect::new(0.0, 0.0, 200.0, 10.0);
        let q = section_quad(rect, UvExtent::FULL, WHITE, 0.25, 0.5, 0.0);
        assert_eq!(q[0].position[0], 49.5);
        assert_eq!(q[2].position[0], 99.5);
        assert_eq!((q[0].uv[0], q[2].uv[0]), (0.25, 0.5));
    }

    #[test]
    fn reflection_fades_to_transparent() {
        let color = ColorRgba::new(1.0, 1.0, 1.0, 0.5);
        let rect = DrawRect::new(0.0, 0.0, 100.0, 100.0);
        let q = reflection_quad(rect, SCREEN, UvExtent::FULL, color, 1.0, 5.0, 40.0, 0.0).unwrap();
        assert_eq!(q[0].alpha(), 127);
        assert_eq!(q[3].alpha(), 127);
        assert_eq!(q[1].alpha(), 0);
        assert_eq!(q[2].alpha(), 0);
        // Placed below the source, flipped.
        assert_eq!(q[0].position[1], -104.5);
        assert_eq!(q[1].position[1], -144.5);
        assert!(q[0].uv[1] > q[1].uv[1]);
    }

    #[test]
    fn reflection_height_capped_at_bounds() {
        let bounds = Rect::new(0.0, 0.0, 100.0, 30.0);
        let rect = DrawRect::new(0.0, 0.0, 100.0, 30.0);
        let white = ColorRgba::white();
        let q = reflection_quad(rect, bounds, UvExtent::FULL, white, 1.0, 0.0, 80.0, 0.0).unwrap();
        let drawn = q[0].position[1] - q[1].position[1];
        assert!(close(drawn, 30.0));
    }

    #[test]
    fn reflection_skips_transparent_and_disjoint() {
        let dst = DrawRect::new(0.0, 0.0, 10.0, 10.0);
        let clear = ColorRgba::white().with_alpha(0.0);
        assert!(reflection_quad(dst, SCREEN, UvExtent::FULL, clear, 1.0, 0.0, 5.0, 0.0).is_none());
        let far = Rect::new(500.0, 500.0, 10.0, 10.0);
        let white = ColorRgba::white();
        assert!(reflection_quad(dst, far, UvExtent::FULL, white, 1.0, 0.0, 5.0, 0.0).is_none());
    }

    #[test]
    fn quarter_turn_rotates_around_centre() {
        let rect = DrawRect::new(0.0, 0.0, 10.0, 10.0);
        let q = textured_quad(rect, SCREEN, UvExtent::FULL, WHITE, false, 0.0).unwrap();
        let m = rotation_transform(Mat4::IDENTITY, 90.0, &q);
        let top_left = m.transform_point3(glam::Vec3::from(q[0].position));
        // Clockwise: top-left corner moves to top-right.
        assert!(close(top_left.x, 9.5) && close(top_left.y, 0.5));
    }

    #[test]
    fn pivot_uses_clipped_rect() {
        let bounds = Rect::new(0.0, 0.0, 5.0, 10.0);
        let rect = DrawRect::new(0.0, 0.0, 10.0, 10.0);
        let q = textured_quad(rect, bounds, UvExtent::FULL, WHITE, false, 0.0).unwrap();
        let m = rotation_transform(Mat4::IDENTITY, 180.0, &q);
        // The clipped centre (2.0, -4.5) is the fixed point.
        let c = m.transform_point3(vec3(2.0, -4.5, 0.0));
        assert!(close(c.x, 2.0) && close(c.y, -4.5));
    }
}
