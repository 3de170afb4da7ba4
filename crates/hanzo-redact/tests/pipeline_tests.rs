//! End-to-end redaction tests over in-memory documents

use hanzo_pii::{BoundingBox, Category, DocumentField, MaskingDecisions, MaskingMode, RedactionTarget};
use hanzo_redact::{
    apply_targets, BatchRequest, DocumentKind, LocateStage, RedactConfig, RedactError, Redactor,
    TargetOutcome,
};
use std::sync::Arc;

fn redactor() -> Redactor {
    let mut config = RedactConfig::default();
    config.audit.enabled = false;
    Redactor::new(config).unwrap()
}

#[cfg(feature = "pdf")]
mod pdf_tests {
    use super::*;
    use hanzo_redact::{PdfCanvas, RedactionCanvas, RenderConfig};
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream, StringFormat};

    fn utf16(text: &str) -> Object {
        let mut bytes = vec![0xFE, 0xFF];
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_be_bytes());
        }
        Object::String(bytes, StringFormat::Hexadecimal)
    }

    fn latin1(text: &str) -> Object {
        Object::string_literal(text)
    }

    fn build_pdf(lines: &[(&str, i64, i64)]) -> Vec<u8> {
        build_pdf_with(lines, utf16)
    }

    fn build_pdf_with(lines: &[(&str, i64, i64)], encode: fn(&str) -> Object) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut operations = Vec::new();
        for (text, x, y) in lines {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), 12.into()]));
            operations.push(Operation::new("Td", vec![(*x).into(), (*y).into()]));
            operations.push(Operation::new("Tj", vec![encode(text)]));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_korean_pdf_end_to_end() {
        let pdf = build_pdf(&[
            ("주민번호 901234-1234567,", 72, 700),
            ("연락처 010-1234-5678", 72, 680),
            ("감사합니다", 72, 600),
        ]);
        let decisions = MaskingDecisions::new()
            .with_category(Category::NationalId, MaskingMode::Full)
            .with_category(Category::Phone, MaskingMode::Full);
        let result = redactor()
            .process(BatchRequest::default().with_decisions(decisions).with_document(pdf))
            .unwrap();

        let categories: Vec<&Category> = result.spans.iter().map(|s| &s.category).collect();
        assert_eq!(categories, vec![&Category::NationalId, &Category::Phone]);
        assert_eq!(
            result.masked_text,
            "주민번호 ******-*******, 연락처 ***-****-**** 감사합니다"
        );
        assert!(result.unanchored.is_empty());
        assert_eq!(result.reports.len(), 2);
        assert!(result
            .reports
            .iter()
            .all(|r| r.stage() == Some(LocateStage::Geometry)));

        let document = result.document.unwrap();
        assert_eq!(document.kind, DocumentKind::Pdf);

        let reopened = PdfCanvas::open(&document.bytes, &RenderConfig::default()).unwrap();
        let remaining: Vec<String> = reopened.fragments(0).into_iter().map(|f| f.text).collect();
        assert_eq!(remaining, vec!["감사합니다".to_string()]);
    }

    #[test]
    fn test_redacted_pdf_holds_no_trace_of_value() {
        let pdf = build_pdf_with(&[("mail secret@example.com now", 72, 700)], latin1);
        let needle: &[u8] = b"secret@example.com";
        assert!(pdf.windows(needle.len()).any(|w| w == needle));

        let result = redactor().process(BatchRequest::default().with_document(pdf)).unwrap();
        assert_eq!(result.applied_count(), 1);
        assert_eq!(result.reports[0].stage(), Some(LocateStage::Geometry));

        let bytes = result.document.unwrap().bytes;
        assert!(!bytes.windows(needle.len()).any(|w| w == needle));
        let reopened = PdfCanvas::open(&bytes, &RenderConfig::default()).unwrap();
        assert!(reopened.fragments(0).is_empty());
    }

    #[test]
    fn test_pdf_without_pii_is_untouched_text() {
        let pdf = build_pdf(&[("nothing to see here", 72, 700)]);
        let result = redactor().process(BatchRequest::default().with_document(pdf)).unwrap();
        assert!(result.spans.is_empty());
        assert!(result.reports.is_empty());

        let bytes = result.document.unwrap().bytes;
        let reopened = PdfCanvas::open(&bytes, &RenderConfig::default()).unwrap();
        assert_eq!(reopened.fragments(0)[0].text, "nothing to see here");
    }

    #[test]
    fn test_pdf_text_target_found_by_search() {
        let pdf = build_pdf(&[("Contact: Mr. Smith, sales", 72, 700)]);
        let mut canvas = PdfCanvas::open(&pdf, &RenderConfig::default()).unwrap();
        let targets = vec![RedactionTarget::text(0, "Jane Smith", None, Category::Person)];
        let reports = apply_targets(&mut canvas, &targets, ' ');
        assert_eq!(reports[0].stage(), Some(LocateStage::Token));
        assert!(canvas.finish().is_ok());
    }
}

#[cfg(feature = "raster")]
mod raster_tests {
    use super::*;
    use hanzo_redact::{RasterCanvas, RenderConfig};
    use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage, Rgba};
    use std::io::Cursor;

    fn white_png(width: u32, height: u32) -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([255, 255, 255])));
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
        bytes
    }

    fn field(text: &str, x1: f32, x2: f32) -> DocumentField {
        DocumentField::new(0, text, BoundingBox::new(x1, 10.0, x2, 30.0))
    }

    #[test]
    fn test_image_with_ocr_fields() {
        let fields = vec![field("Email", 10.0, 60.0), field("jane@corp.io", 100.0, 250.0)];
        let result = redactor()
            .process(
                BatchRequest::default()
                    .with_fields(fields)
                    .with_document(white_png(300, 100)),
            )
            .unwrap();

        assert_eq!(result.spans.by_category(&Category::Email).len(), 1);
        assert_eq!(result.applied_count(), 1);
        let document = result.document.unwrap();
        assert_eq!(document.kind, DocumentKind::Image);

        let redacted = image::load_from_memory(&document.bytes).unwrap();
        assert_eq!(redacted.get_pixel(150, 20), Rgba([0, 0, 0, 255]));
        assert_eq!(redacted.get_pixel(30, 20), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_split_value_still_applied() {
        let mut canvas = RasterCanvas::open(&white_png(200, 50), &RenderConfig::default())
            .unwrap()
            .with_fields(&[field("email", 10.0, 60.0), field("@x.com", 60.0, 120.0)]);
        let targets = vec![RedactionTarget::text(0, "email@x.com", None, Category::Email)];
        let reports = apply_targets(&mut canvas, &targets, ' ');
        assert!(reports[0].is_applied());
    }

    #[test]
    fn test_value_split_across_fields_skips_earlier_duplicate() {
        let mut config = RedactConfig::default();
        config.audit.enabled = false;
        config.pii.detection.entities.persons = vec!["John Doe".to_string()];
        let redactor = Redactor::new(config).unwrap();

        let fields = vec![
            field("Doe", 0.0, 30.0),
            field("John", 100.0, 140.0),
            field("Doe", 150.0, 180.0),
        ];
        let result = redactor
            .process(
                BatchRequest::default()
                    .with_fields(fields)
                    .with_document(white_png(200, 50)),
            )
            .unwrap();

        assert_eq!(result.targets.len(), 1);
        assert_eq!(result.reports[0].stage(), Some(LocateStage::ExactText));

        let redacted = image::load_from_memory(&result.document.unwrap().bytes).unwrap();
        assert_eq!(redacted.get_pixel(15, 20), Rgba([255, 255, 255, 255]));
        assert_eq!(redacted.get_pixel(120, 20), Rgba([0, 0, 0, 255]));
        assert_eq!(redacted.get_pixel(165, 20), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_token_fallback_and_isolated_miss() {
        let mut canvas = RasterCanvas::open(&white_png(200, 50), &RenderConfig::default())
            .unwrap()
            .with_fields(&[field("Mr.", 10.0, 40.0), field("Smith,", 50.0, 110.0)]);
        let targets = vec![
            RedactionTarget::text(0, "absent value", None, Category::Person),
            RedactionTarget::text(0, "Jane Smith", None, Category::Person),
            RedactionTarget::region(0, BoundingBox::new(150.0, 0.0, 160.0, 10.0), Category::Gps),
        ];
        let reports = apply_targets(&mut canvas, &targets, ' ');

        assert_eq!(reports[0].outcome, TargetOutcome::NotFound);
        assert_eq!(reports[1].stage(), Some(LocateStage::Token));
        assert_eq!(reports[2].stage(), Some(LocateStage::Geometry));

        let redacted = image::load_from_memory(&canvas.finish().unwrap()).unwrap();
        assert_eq!(redacted.get_pixel(60, 20), Rgba([0, 0, 0, 255]));
        assert_eq!(redacted.get_pixel(155, 5), Rgba([0, 0, 0, 255]));
        assert_eq!(redacted.get_pixel(20, 20), Rgba([255, 255, 255, 255]));
    }

    #[tokio::test]
    async fn test_process_many_keeps_order_and_isolates_failures() {
        let redactor = Arc::new(redactor());
        let requests = vec![
            BatchRequest::new("mail jane@corp.io"),
            BatchRequest::new("broken").with_document(b"not a document".to_vec()),
            BatchRequest::new("image")
                .with_fields(vec![field("010-1234-5678", 10.0, 140.0)])
                .with_document(white_png(160, 40)),
        ];

        let results = redactor.process_many(requests).await;
        assert_eq!(results.len(), 3);

        let first = results[0].as_ref().unwrap();
        assert_eq!(first.spans.by_category(&Category::Email).len(), 1);
        assert!(matches!(results[1], Err(RedactError::DocumentFormat(_))));
        let third = results[2].as_ref().unwrap();
        assert_eq!(third.applied_count(), 1);
    }
}

#[test]
fn test_text_only_masking_with_value_decision() {
    let decisions = MaskingDecisions::new().with_value("jane@corp.io", MaskingMode::Full);
    let result = redactor()
        .process(BatchRequest::new("a jane@corp.io b john@corp.io").with_decisions(decisions))
        .unwrap();
    assert_eq!(result.spans.len(), 2);
    assert!(!result.masked_text.contains("jane@corp.io"));
    assert!(!result.masked_text.contains("john@corp.io"));
    assert_ne!(result.previews[0].mode, result.previews[1].mode);
}
