//! The runtime library ABI targeted by generated code.

use crate::{codegen::emit::MemberRef, types::DeclType};

pub const IMAGE_CLASS: &str = "cop5555fa13/runtime/PLPImage";
pub const IMAGE_DESC: &str = "Lcop5555fa13/runtime/PLPImage;";
pub const PIXEL_CLASS: &str = "cop5555fa13/runtime/Pixel";
pub const OBJECT_CLASS: &str = "java/lang/Object";

pub const MAIN: &str = "main";
pub const MAIN_DESC: &str = "([Ljava/lang/String;)V";

pub const VOID_DESC: &str = "()V";
pub const GETTER_DESC: &str = "()I";
pub const SET_PIXEL_DESC: &str = "(III)V";
pub const SET_SAMPLE_DESC: &str = "(IIII)V";
pub const GET_SAMPLE_DESC: &str = "(III)I";
pub const MAKE_PIXEL_DESC: &str = "(III)I";
pub const PAUSE_DESC: &str = "(I)V";
pub const LOAD_IMAGE_DESC: &str = "(Ljava/lang/String;)V";

pub const RED: i32 = 0;
pub const GREEN: i32 = 1;
pub const BLUE: i32 = 2;
/// The maximum channel value, spelled `Z` in programs.
pub const Z: i32 = 255;
pub const SCREEN_SIZE: i32 = 1000;

/// Returns the channel code of a color name, compared case-insensitively.
pub fn channel(color: &str) -> Option<i32> {
    [("red", RED), ("green", GREEN), ("blue", BLUE)]
        .into_iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(color))
        .map(|(_, code)| code)
}

/// The field descriptor of a global of the provided type.
pub fn descriptor(ty: DeclType) -> &'static str {
    match ty {
        DeclType::Int | DeclType::Pixel => "I",
        DeclType::Boolean => "Z",
        DeclType::Image => IMAGE_DESC,
    }
}

/// A method or instance field of the image class.
pub fn image_member(name: &str, descriptor: &str) -> MemberRef {
    MemberRef::new(IMAGE_CLASS, name, descriptor)
}

pub fn make_pixel() -> MemberRef {
    MemberRef::new(PIXEL_CLASS, "makePixel", MAKE_PIXEL_DESC)
}

pub fn pause() -> MemberRef {
    MemberRef::new(IMAGE_CLASS, "pause", PAUSE_DESC)
}

pub fn update_frame() -> MemberRef {
    image_member("updateFrame", VOID_DESC)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_ignore_case() {
        assert_eq!(channel("red"), Some(RED));
        assert_eq!(channel("GREEN"), Some(GREEN));
        assert_eq!(channel("Blue"), Some(BLUE));
        assert_eq!(channel("alpha"), None);
    }
}
