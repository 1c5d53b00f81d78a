use lopdf::Document;

/// Overall ceiling on how many bytes a row preview fetch will pull; most
/// documents come back whole, pathologically large ones are cut off here.
pub const MAX_PREVIEW_BYTES: u64 = 50 * 1024 * 1024;

/// Reads the total page count from PDF bytes.
///
/// The input is usually a bounded prefix of the document, so parsing can
/// legitimately fail; that is reported as `None` and the caller keeps
/// whatever it was displaying before.
pub fn page_count(bytes: &[u8]) -> Option<u32> {
    match Document::load_mem(bytes) {
        Ok(document) => Some(document.get_pages().len() as u32),
        Err(e) => {
            tracing::debug!(error = %e, "could not parse pdf bytes for page count");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Object};

    fn single_page_pdf() -> Vec<u8> {
        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();
        let page_id = document.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });
        document.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        document.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        document.save_to(&mut buffer).expect("failed to serialize test pdf");
        buffer
    }

    #[test]
    fn test_page_count_of_valid_pdf() {
        assert_eq!(page_count(&single_page_pdf()), Some(1));
    }

    #[test]
    fn test_page_count_of_garbage_is_none() {
        assert_eq!(page_count(b"definitely not a pdf"), None);
        assert_eq!(page_count(b""), None);
    }
}
