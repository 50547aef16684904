use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

/// Characters escaped inside a single URL path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Build the image location of one document page.
///
/// The page number is zero-padded to three digits; wider numbers are kept
/// as they are.
///
/// # Examples
///
/// ```
/// use pagecard::page_image::page_image_url;
///
/// assert_eq!(
///     page_image_url("https://img.example.org/", "vol1/doc-7", 4),
///     "https://img.example.org/vol1/doc-7/page-004.jpg"
/// );
/// ```
pub fn page_image_url(
    base: &str,
    document_id: &str,
    page_number: u32,
) -> String {
    let base = base.trim_end_matches('/');
    let document = document_id
        .split('/')
        .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/");
    format!("{base}/{document}/page-{page_number:03}.jpg")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_to_three_digits() {
        assert_eq!(
            page_image_url("/pages", "doc", 1),
            "/pages/doc/page-001.jpg"
        );
        assert_eq!(
            page_image_url("/pages", "doc", 42),
            "/pages/doc/page-042.jpg"
        );
        assert_eq!(
            page_image_url("/pages", "doc", 1234),
            "/pages/doc/page-1234.jpg"
        );
    }

    #[test]
    fn trailing_slashes_on_base_are_ignored() {
        assert_eq!(
            page_image_url("https://x.test//", "a/b", 2),
            "https://x.test/a/b/page-002.jpg"
        );
    }

    #[test]
    fn plain_document_ids_pass_through() {
        let url = page_image_url("/p", "VOL00001/IMAGES/0001/EFTA-00_01", 7);
        assert_eq!(url, "/p/VOL00001/IMAGES/0001/EFTA-00_01/page-007.jpg");
    }

    #[test]
    fn unsafe_characters_are_escaped_per_segment() {
        let url = page_image_url("/p", "box 3/memo#2", 5);
        assert_eq!(url, "/p/box%203/memo%232/page-005.jpg");
    }
}
