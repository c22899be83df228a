use crate::{check_references, content_of_first_page, open};
use folio::{SplitOptions, split_document};
use folio_syntax::object::Number;
use folio_tests::PdfBuilder;
use pdf_writer::{Name, Pdf, Rect, Ref};
use tempfile::TempDir;

/// A document written by `pdf-writer`, with two pages sharing a font and the first one
/// linking to the second.
fn written_by_pdf_writer() -> Vec<u8> {
    let catalog_id = Ref::new(1);
    let pages_id = Ref::new(2);
    let page_ids = [Ref::new(3), Ref::new(4)];
    let content_ids = [Ref::new(5), Ref::new(6)];
    let font_id = Ref::new(7);
    let link_id = Ref::new(8);

    let mut pdf = Pdf::new();
    pdf.catalog(catalog_id).pages(pages_id);
    pdf.pages(pages_id).kids(page_ids).count(2);

    for (i, (page_id, content_id)) in page_ids.into_iter().zip(content_ids).enumerate() {
        let mut page = pdf.page(page_id);
        page.parent(pages_id)
            .media_box(Rect::new(0.0, 0.0, 420.0, 595.0))
            .contents(content_id);
        page.resources().fonts().pair(Name(b"F1"), font_id);

        if i == 0 {
            page.insert(Name(b"Annots")).array().item(link_id);
        }
    }

    for (i, content_id) in content_ids.into_iter().enumerate() {
        pdf.stream(content_id, format!("BT /F1 24 Tf (Sheet {i}) Tj ET").as_bytes());
    }

    pdf.type1_font(font_id).base_font(Name(b"Helvetica"));

    let mut link = pdf.indirect(link_id).dict();
    link.pair(Name(b"Type"), Name(b"Annot"))
        .pair(Name(b"Subtype"), Name(b"Link"));
    link.insert(Name(b"Dest")).array().item(page_ids[1]).item(Name(b"Fit"));
    drop(link);

    pdf.finish()
}

#[test]
fn split_pdf_writer_output() {
    let dir = TempDir::new().unwrap();
    let doc = open(written_by_pdf_writer());

    let report = split_document(&doc, dir.path(), &SplitOptions::default()).unwrap();
    assert!(report.is_complete());

    for (i, outcome) in report.pages.iter().enumerate() {
        let page = crate::open_page(outcome.path().unwrap());

        assert_eq!(
            content_of_first_page(&page),
            format!("BT /F1 24 Tf (Sheet {i}) Tj ET").as_bytes()
        );
        assert_eq!(page.resolve_page(0).unwrap().media_box().width(), 420.0);
        check_references(&page);
    }
}

#[test]
fn link_to_other_page_is_dropped() {
    let doc = open(written_by_pdf_writer());
    let out = open(folio_write::write(&folio_write::extract(&doc, 0).unwrap()));

    let page = out.resolve_page(0).unwrap();
    let annots = page.dict().get_array(b"Annots").unwrap();
    let link = out.deref(&annots[0]).unwrap();

    assert!(link.as_dict().unwrap().get_array(b"Dest").unwrap()[0].is_null());
    // The second page and its content are gone.
    assert_eq!(out.page_count().unwrap(), 1);
    assert!(
        !out.data()
            .windows(b"Sheet 1".len())
            .any(|w| w == b"Sheet 1")
    );
}

#[test]
fn numbers_are_copied_exactly() {
    let doc = open(
        PdfBuilder::new("1.7")
            .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
            .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
            .object(
                3,
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Big 3000000001 \
                 /Negative -3000000001 /Fine 0.123456789 /Whole 2.0 \
                 /M [1.00000012 0 0 1 612.123456 0] >>",
            )
            .classic_xref("/Size 4 /Root 1 0 R")
            .finish(),
    );
    let out = open(folio_write::write(&folio_write::extract(&doc, 0).unwrap()));
    let page = out.resolve_page(0).unwrap();
    let number = |key: &[u8]| page.dict().get(key).unwrap().as_number().unwrap();

    assert_eq!(number(b"Big"), Number::Integer(3_000_000_001));
    assert_eq!(number(b"Negative"), Number::Integer(-3_000_000_001));
    assert_eq!(number(b"Fine"), Number::Real(0.123456789));
    assert_eq!(number(b"Whole"), Number::Real(2.0));

    let matrix = page.dict().get_array(b"M").unwrap();
    assert_eq!(matrix[0].as_number(), Some(Number::Real(1.00000012)));
    assert_eq!(matrix[1].as_number(), Some(Number::Integer(0)));
    assert_eq!(matrix[4].as_number(), Some(Number::Real(612.123456)));
}
