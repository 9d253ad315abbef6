use image::{Rgba, RgbaImage};

/// Fully transparent background pixel
pub const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// RGBA surface an overlay is drawn on before being published.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayPlate {
    image: RgbaImage,
}

impl OverlayPlate {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, CLEAR),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbaImage {
        &mut self.image
    }

    pub fn clear(&mut self) {
        for px in self.image.pixels_mut() {
            *px = CLEAR;
        }
    }

    pub fn fill_alpha_channel(&mut self) {
        fill_alpha_channel(&mut self.image);
    }
}

/// Make every pixel with a non-zero color channel opaque. Untouched
/// background keeps its alpha, so only drawn content covers the camera image.
pub fn fill_alpha_channel(image: &mut RgbaImage) {
    for px in image.pixels_mut() {
        if px[0] != 0 || px[1] != 0 || px[2] != 0 {
            px[3] = 255;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_plate_is_transparent() {
        let plate = OverlayPlate::new(4, 3);
        assert_eq!(plate.dimensions(), (4, 3));
        assert!(plate.image().pixels().all(|p| *p == CLEAR));
    }

    #[test]
    fn test_fill_alpha_channel() {
        let mut image = RgbaImage::from_pixel(3, 1, CLEAR);
        image.put_pixel(0, 0, Rgba([10, 0, 0, 0]));
        image.put_pixel(1, 0, Rgba([0, 0, 0, 0]));
        image.put_pixel(2, 0, Rgba([0, 0, 200, 17]));
        fill_alpha_channel(&mut image);

        assert_eq!(image.get_pixel(0, 0)[3], 255);
        assert_eq!(image.get_pixel(1, 0)[3], 0);
        assert_eq!(image.get_pixel(2, 0)[3], 255);
    }

    #[test]
    fn test_black_shadow_pixels_stay_as_drawn() {
        // pure black keeps whatever alpha the drawing gave it
        let mut image = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 255]));
        fill_alpha_channel(&mut image);
        assert_eq!(*image.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_clear() {
        let mut plate = OverlayPlate::new(2, 2);
        plate.image_mut().put_pixel(1, 1, Rgba([1, 2, 3, 255]));
        plate.clear();
        assert!(plate.image().pixels().all(|p| *p == CLEAR));
    }
}
