//! Manual planar 4:2:0 + alpha to RGBA conversion.
//!
//! Decoders mishandle `yuva420p` when asked for RGB output directly, so the
//! pipeline requests the raw planes and reconstructs RGB here: crop each
//! plane to its logical width, nearest-neighbor upsample the chroma planes to
//! luma resolution, clip to video range, subtract the standard offsets and
//! apply the BT.601 coefficient matrix. The separately carried alpha plane is
//! appended untouched.

use crate::{
    error::{ConvertError, ConvertResult},
    frame::Frame,
};

/// Drop per-row padding: keep `width` bytes of every `stride`-byte row.
pub fn crop_plane(data: &[u8], stride: usize, width: usize, height: usize) -> Vec<u8> {
    if stride == width {
        return data[..width * height].to_vec();
    }
    let mut out = Vec::with_capacity(width * height);
    for row in 0..height {
        let start = row * stride;
        out.extend_from_slice(&data[start..start + width]);
    }
    out
}

/// Nearest-neighbor 2x upsample in both axes.
pub fn upsample_chroma_2x(plane: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(width * height * 4);
    for row in 0..height {
        let line = &plane[row * width..(row + 1) * width];
        for _ in 0..2 {
            for &s in line {
                out.push(s);
                out.push(s);
            }
        }
    }
    out
}

/// Convert full-resolution planes (chroma already upsampled) to straight
/// RGBA. All planes must be `width * height` bytes.
pub fn planes_to_rgba(
    y: &[u8],
    u: &[u8],
    v: &[u8],
    a: &[u8],
    width: usize,
    height: usize,
) -> ConvertResult<Frame> {
    let n = width * height;
    if y.len() != n || u.len() != n || v.len() != n || a.len() != n {
        return Err(ConvertError::decode(
            "yuv planes do not match the frame dimensions",
        ));
    }

    let mut data = Vec::with_capacity(n * 4);
    for i in 0..n {
        let yf = f32::from(y[i].clamp(16, 235)) - 16.0;
        let uf = f32::from(u[i].clamp(16, 240)) - 128.0;
        let vf = f32::from(v[i].clamp(16, 240)) - 128.0;

        // BT.601 video-range coefficients.
        let r = 1.164 * yf + 1.596 * vf;
        let g = 1.164 * yf - 0.392 * uf - 0.813 * vf;
        let b = 1.164 * yf + 2.017 * uf;

        data.push(r.round().clamp(0.0, 255.0) as u8);
        data.push(g.round().clamp(0.0, 255.0) as u8);
        data.push(b.round().clamp(0.0, 255.0) as u8);
        data.push(a[i]);
    }

    Frame::new(width as u32, height as u32, data)
}

/// Convert one tightly packed `yuva420p` frame (Y, U, V, A planes in that
/// order, chroma subsampled 2x2) to RGBA. Width and height must be even;
/// callers truncate odd dimensions by one pixel so the subsampling stays
/// exact.
pub fn yuva420_frame_to_rgba(buf: &[u8], width: usize, height: usize) -> ConvertResult<Frame> {
    if !width.is_multiple_of(2) || !height.is_multiple_of(2) {
        return Err(ConvertError::decode(
            "yuva420p conversion requires even dimensions",
        ));
    }
    let (cw, ch) = (width / 2, height / 2);
    let expected = width * height * 2 + cw * ch * 2;
    if buf.len() != expected {
        return Err(ConvertError::decode(format!(
            "yuva420p frame has {} bytes, expected {expected} for {width}x{height}",
            buf.len()
        )));
    }

    let y_end = width * height;
    let u_end = y_end + cw * ch;
    let v_end = u_end + cw * ch;

    let y = &buf[..y_end];
    let u = upsample_chroma_2x(&buf[y_end..u_end], cw, ch);
    let v = upsample_chroma_2x(&buf[u_end..v_end], cw, ch);
    let a = &buf[v_end..];

    planes_to_rgba(y, &u, &v, a, width, height)
}

/// Byte length of one tightly packed yuva420p frame.
pub fn yuva420_frame_len(width: usize, height: usize) -> usize {
    width * height * 2 + (width / 2) * (height / 2) * 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crop_plane_strips_row_padding() {
        // 3 useful bytes per row, stride 5.
        let data = [1, 2, 3, 9, 9, 4, 5, 6, 9, 9];
        assert_eq!(crop_plane(&data, 5, 3, 2), vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(crop_plane(&[1, 2, 3, 4], 2, 2, 2), vec![1, 2, 3, 4]);
    }

    #[test]
    fn upsample_replicates_2x2_blocks() {
        let plane = [1u8, 2, 3, 4];
        let up = upsample_chroma_2x(&plane, 2, 2);
        assert_eq!(
            up,
            vec![1, 1, 2, 2, 1, 1, 2, 2, 3, 3, 4, 4, 3, 3, 4, 4]
        );
    }

    fn uniform_yuva(width: usize, height: usize, y: u8, u: u8, v: u8, a: u8) -> Vec<u8> {
        let mut buf = vec![y; width * height];
        buf.extend(vec![u; width / 2 * height / 2]);
        buf.extend(vec![v; width / 2 * height / 2]);
        buf.extend(vec![a; width * height]);
        buf
    }

    #[test]
    fn white_and_black_points() {
        let white = yuva420_frame_to_rgba(&uniform_yuva(2, 2, 235, 128, 128, 255), 2, 2).unwrap();
        assert_eq!(&white.data[..4], &[255, 255, 255, 255]);

        let black = yuva420_frame_to_rgba(&uniform_yuva(2, 2, 16, 128, 128, 200), 2, 2).unwrap();
        assert_eq!(&black.data[..4], &[0, 0, 0, 200]);
    }

    #[test]
    fn red_point_is_close() {
        // BT.601 video-range red is roughly Y=81, Cb=90, Cr=240.
        let red = yuva420_frame_to_rgba(&uniform_yuva(2, 2, 81, 90, 240, 255), 2, 2).unwrap();
        let [r, g, b, a] = [red.data[0], red.data[1], red.data[2], red.data[3]];
        assert!(r >= 250, "r was {r}");
        assert!(g <= 5, "g was {g}");
        assert!(b <= 5, "b was {b}");
        assert_eq!(a, 255);
    }

    #[test]
    fn out_of_range_values_are_clipped_before_the_matrix() {
        // Y above 235 behaves exactly like 235.
        let a = yuva420_frame_to_rgba(&uniform_yuva(2, 2, 255, 128, 128, 255), 2, 2).unwrap();
        let b = yuva420_frame_to_rgba(&uniform_yuva(2, 2, 235, 128, 128, 255), 2, 2).unwrap();
        assert_eq!(a.data, b.data);
    }

    #[test]
    fn rejects_odd_dimensions_and_bad_lengths() {
        assert!(yuva420_frame_to_rgba(&[0u8; 10], 3, 2).is_err());
        assert!(yuva420_frame_to_rgba(&[0u8; 10], 2, 2).is_err());
        assert_eq!(yuva420_frame_len(4, 4), 40);
    }
}
