use std::sync::Arc;

use vidmark::{
    Canvas, LayerContents, MediaElement, MediaItem, PreparedImage, Rect, SourceAsset, SvgView,
    TextContent, build_layer_tree,
};

fn logo() -> PreparedImage {
    PreparedImage::from_premul_rgba8(2, 2, [255, 255, 255, 255].repeat(4)).unwrap()
}

#[test]
fn overlay_children_follow_input_order_with_verbatim_frames() {
    let size = Canvas::new(640, 360);
    let image_frame = Rect::from_origin_size((0.0, 0.0), (200.0, 200.0));
    let text_frame = Rect::from_origin_size((10.0, 10.0), (100.0, 40.0));

    let mut item = MediaItem::new(SourceAsset::Image(logo()), size);
    item.add_element(MediaElement::image(logo(), image_frame));
    item.add_element(MediaElement::text(
        TextContent::new("Confidential draft"),
        text_frame,
    ));

    let tree = build_layer_tree(&item, size).unwrap();
    assert_eq!(tree.parent.frame, size.rect());
    assert!(matches!(tree.video_layer().contents, LayerContents::VideoFrames));

    let overlay = tree.overlay();
    assert!(overlay.masks_to_bounds);
    assert_eq!(overlay.frame, size.rect());
    assert_eq!(overlay.sublayers.len(), 2);

    assert_eq!(overlay.sublayers[0].frame, image_frame);
    assert!(matches!(overlay.sublayers[0].contents, LayerContents::Image(_)));

    assert_eq!(overlay.sublayers[1].frame, text_frame);
    match &overlay.sublayers[1].contents {
        LayerContents::Text(t) => assert_eq!(t.string, "Confidential draft"),
        other => panic!("expected a text layer, got {other:?}"),
    }
}

#[test]
fn view_elements_are_snapshotted_into_image_layers() {
    let svg = br##"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="6">
        <rect width="10" height="6" fill="#00ff00"/>
    </svg>"##;
    let view = SvgView::from_data(svg, None).unwrap();

    let size = Canvas::new(64, 64);
    let mut item = MediaItem::new(SourceAsset::Image(logo()), size);
    item.add_element(MediaElement::view(
        Arc::new(view),
        Rect::new(5.0, 5.0, 25.0, 17.0),
    ));

    let tree = build_layer_tree(&item, size).unwrap();
    match &tree.overlay().sublayers[0].contents {
        LayerContents::Image(img) => {
            assert_eq!((img.width, img.height), (10, 6));
            assert_eq!(&img.rgba8_premul[..4], &[0, 255, 0, 255]);
        }
        other => panic!("expected an image layer, got {other:?}"),
    }
}
