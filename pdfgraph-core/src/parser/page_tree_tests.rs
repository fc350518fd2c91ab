//! Tests for the page tree module

use super::*;
use crate::parser::store::MemoryStore;
use crate::parser::PdfString;

fn id(number: u32) -> ObjectId {
    ObjectId::new(number, 0)
}

fn store(objects: &[(u32, &str)]) -> MemoryStore {
    let mut store = MemoryStore::new();
    for (number, body) in objects {
        store.insert_bytes(id(*number), *body);
    }
    store
}

fn build(objects: &[(u32, &str)], options: &ParseOptions) -> (Resolver<MemoryStore>, ParseResult<PageTree>) {
    let resolver = Resolver::new(store(objects));
    let tree = PageTree::build(&resolver, id(1), options);
    (resolver, tree)
}

#[test]
fn test_pages_in_document_order() {
    let (_, tree) = build(
        &[
            (1, "<< /Type /Pages /Kids [2 0 R 5 0 R] /Count 3 >>"),
            (2, "<< /Type /Pages /Parent 1 0 R /Kids [3 0 R 4 0 R] /Count 2 >>"),
            (3, "<< /Type /Page /Parent 2 0 R >>"),
            (4, "<< /Type /Page /Parent 2 0 R >>"),
            (5, "<< /Type /Page /Parent 1 0 R >>"),
        ],
        &ParseOptions::strict(),
    );
    let tree = tree.unwrap();

    assert_eq!(tree.page_count(), 3);
    let order: Vec<_> = (0..3)
        .map(|i| tree.node(tree.page_node(i).unwrap()).unwrap().id)
        .collect();
    assert_eq!(order, vec![id(3), id(4), id(5)]);
    assert_eq!(tree.page_index_of(id(5)), Some(2));
    assert_eq!(tree.page_index_of(id(2)), None);
}

#[test]
fn test_ancestor_chain() {
    let (_, tree) = build(
        &[
            (1, "<< /Type /Pages /Kids [2 0 R] >>"),
            (2, "<< /Type /Pages /Kids [3 0 R] >>"),
            (3, "<< /Type /Page >>"),
        ],
        &ParseOptions::strict(),
    );
    let tree = tree.unwrap();
    let leaf = tree.page_node(0).unwrap();
    let chain: Vec<_> = tree
        .ancestors(leaf)
        .map(|index| tree.node(index).unwrap().id)
        .collect();
    assert_eq!(chain, vec![id(3), id(2), id(1)]);
}

#[test]
fn test_type_is_inferred() {
    let (_, tree) = build(
        &[(1, "<< /Kids [2 0 R] >>"), (2, "<< /Contents 9 0 R >>")],
        &ParseOptions::strict(),
    );
    let tree = tree.unwrap();
    assert_eq!(tree.page_count(), 1);
    assert_eq!(tree.node(0).unwrap().kind, NodeKind::Pages);
}

#[test]
fn test_media_box_and_rotation_are_inherited() {
    let (resolver, tree) = build(
        &[
            (1, "<< /Type /Pages /Kids [2 0 R 3 0 R] /MediaBox [0 0 595 842] /Rotate 90 >>"),
            (2, "<< /Type /Page >>"),
            (3, "<< /Type /Page /MediaBox [0 0 200 100] /Rotate -90 >>"),
        ],
        &ParseOptions::strict(),
    );
    let tree = tree.unwrap();

    let first = tree.load_page(&resolver, 0).unwrap();
    assert_eq!(first.media_box, Rectangle::new(0.0, 0.0, 595.0, 842.0));
    assert_eq!(first.crop_box, first.media_box);
    assert_eq!(first.rotation, 90);
    assert_eq!(first.width(), 842.0);

    let second = tree.load_page(&resolver, 1).unwrap();
    assert_eq!(second.media_box, Rectangle::new(0.0, 0.0, 200.0, 100.0));
    assert_eq!(second.rotation, 270);
}

#[test]
fn test_defaults_when_nothing_is_inherited() {
    let (resolver, tree) = build(
        &[(1, "<< /Type /Pages /Kids [2 0 R] >>"), (2, "<< /Type /Page >>")],
        &ParseOptions::strict(),
    );
    let tree = tree.unwrap();
    let page = tree.load_page(&resolver, 0).unwrap();

    assert_eq!(page.media_box, Rectangle::LETTER);
    assert_eq!(page.rotation, 0);
    assert!(!page.has_contents());
    assert!(tree.resources(&resolver, &page).unwrap().is_empty());
}

#[test]
fn test_malformed_value_falls_through_to_parent() {
    let (resolver, tree) = build(
        &[
            (1, "<< /Type /Pages /Kids [2 0 R] /MediaBox [0 0 300 400] >>"),
            (2, "<< /Type /Page /MediaBox [0 0 (wide) 10] /Rotate 45 >>"),
        ],
        &ParseOptions::strict(),
    );
    let tree = tree.unwrap();
    let page = tree.load_page(&resolver, 0).unwrap();
    assert_eq!(page.media_box, Rectangle::new(0.0, 0.0, 300.0, 400.0));
    assert_eq!(page.rotation, 0);
}

#[test]
fn test_indirect_inherited_resources() {
    let (resolver, tree) = build(
        &[
            (1, "<< /Type /Pages /Kids [2 0 R] /Resources 3 0 R >>"),
            (2, "<< /Type /Page >>"),
            (3, "<< /Font << /F1 4 0 R >> >>"),
        ],
        &ParseOptions::strict(),
    );
    let tree = tree.unwrap();
    let page = tree.load_page(&resolver, 0).unwrap();
    let resources = tree.resources(&resolver, &page).unwrap();
    let fonts = resources.get("Font").unwrap().as_dict().unwrap();
    assert_eq!(fonts.get("F1").unwrap().as_reference(), Some(id(4)));
}

#[test]
fn test_unresolvable_ancestor_value_is_skipped() {
    let (resolver, tree) = build(
        &[
            (1, "<< /Type /Pages /Kids [2 0 R] /MediaBox [0 0 10 20] >>"),
            (2, "<< /Type /Page /MediaBox 77 0 R >>"),
        ],
        &ParseOptions::strict(),
    );
    let tree = tree.unwrap();
    let page = tree.load_page(&resolver, 0).unwrap();
    assert_eq!(page.media_box, Rectangle::new(0.0, 0.0, 10.0, 20.0));
}

#[test]
fn test_cycle_is_skipped() {
    let objects = [
        (1, "<< /Type /Pages /Kids [2 0 R] >>"),
        (2, "<< /Type /Pages /Kids [1 0 R 3 0 R] >>"),
        (3, "<< /Type /Page >>"),
    ];
    for options in [ParseOptions::strict(), ParseOptions::lenient()] {
        let (_, tree) = build(&objects, &options);
        let tree = tree.unwrap();
        assert_eq!(tree.page_count(), 1);
        assert_eq!(tree.page_index_of(id(3)), Some(0));
    }
}

#[test]
fn test_too_deep_subtree_is_skipped() {
    let options = ParseOptions {
        max_depth: 1,
        ..ParseOptions::strict()
    };
    let (_, tree) = build(
        &[
            (1, "<< /Type /Pages /Kids [2 0 R 4 0 R] >>"),
            (2, "<< /Type /Pages /Kids [3 0 R] >>"),
            (3, "<< /Type /Page >>"),
            (4, "<< /Type /Page >>"),
        ],
        &options,
    );
    let tree = tree.unwrap();
    assert_eq!(tree.page_count(), 1);
    assert_eq!(tree.page_index_of(id(4)), Some(0));
}

#[test]
fn test_missing_kid_depends_on_mode() {
    let objects = [
        (1, "<< /Type /Pages /Kids [2 0 R 3 0 R] >>"),
        (3, "<< /Type /Page >>"),
    ];
    let (resolver, strict) = build(&objects, &ParseOptions::strict());
    let strict = strict.unwrap();
    assert_eq!(strict.page_count(), 2);
    let placeholder = strict.node(strict.page_node(0).unwrap()).unwrap();
    assert_eq!(placeholder.id, id(2));
    assert!(!placeholder.resolved);
    assert!(matches!(
        strict.load_page(&resolver, 0),
        Err(ParseError::UnresolvedReference(missing)) if missing == id(2)
    ));
    assert_eq!(strict.load_page(&resolver, 1).unwrap().id, id(3));

    let (_, lenient) = build(&objects, &ParseOptions::lenient());
    assert_eq!(lenient.unwrap().page_count(), 1);
}

#[test]
fn test_unreadable_root_is_error() {
    let (_, missing) = build(&[], &ParseOptions::lenient());
    assert!(matches!(missing, Err(ParseError::UnresolvedReference(_))));

    let (_, not_a_dict) = build(&[(1, "42")], &ParseOptions::lenient());
    assert!(matches!(not_a_dict, Err(ParseError::InvalidPage(_))));
}

#[test]
fn test_page_index_out_of_range() {
    let (resolver, tree) = build(
        &[(1, "<< /Type /Pages /Kids [] >>")],
        &ParseOptions::strict(),
    );
    let tree = tree.unwrap();
    assert!(matches!(
        tree.load_page(&resolver, 0),
        Err(ParseError::InvalidPage(_))
    ));
}

#[test]
fn test_rectangle_from_array() {
    let array = PdfArray(vec![
        PdfObject::Integer(612),
        PdfObject::Real(792.0),
        PdfObject::Integer(0),
        PdfObject::Integer(0),
    ]);
    assert_eq!(Rectangle::from_array(&array), Some(Rectangle::LETTER));

    let short = PdfArray(vec![PdfObject::Integer(1)]);
    assert_eq!(Rectangle::from_array(&short), None);

    let wrong = PdfArray(vec![
        PdfObject::Integer(0),
        PdfObject::Integer(0),
        PdfObject::String(PdfString::new(b"x".to_vec())),
        PdfObject::Integer(0),
    ]);
    assert_eq!(Rectangle::from_array(&wrong), None);
    assert_eq!(Rectangle::LETTER.width(), 612.0);
    assert_eq!(Rectangle::LETTER.height(), 792.0);
}
