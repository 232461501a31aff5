use collection_view::{CollectionView, CollectionViewOptions, GroupByItem, GroupMode, ViewMode};
use collection_view_adapter::Controller;

fn main() {
    // Example: keep the first visible row in place while items arrive above it, then jump to
    // an item in a collapsed group.
    //
    // The host flow is typically:
    // 1) report width / viewport / scroll to the controller
    // 2) mutate the view through `view_mut()`
    // 3) call `sync()` and apply the returned scroll offset, if any
    let options = CollectionViewOptions::new(|x: &u32, _: ViewMode, _: bool| *x, |a: &u32, b: &u32| {
        a.cmp(b)
    });
    let mut v = CollectionView::new(options).expect("one view mode");
    v.set_visible(true);
    v.reload(
        (1..=40).collect(),
        GroupMode::GroupBy,
        &[
            GroupByItem::new("small", |x: &u32| *x < 20),
            GroupByItem::new("large", |x: &u32| *x >= 20),
        ],
        true,
        true,
    );

    let mut c = Controller::new(v, 16);
    c.on_viewport_size(120);
    c.on_width(100);
    c.on_scroll(80);
    println!(
        "before insert: off={} visible={:?}",
        c.scroll_offset(),
        c.visible_range()
    );

    c.view_mut().insert(&[41, 42, 43]);
    let moved = c.sync();
    println!("after insert: moved={moved:?} off={}", c.scroll_offset());

    let small = c.view().group(c.view().root()).expect("root").groups()[1];
    c.set_expanded(small, false);
    c.view_mut().scroll_to(None, Some(&5), true);
    println!("scroll_to(5): {:?}", c.sync());
    for e in &c.display_list().entries()[c.visible_range()] {
        println!("  {:?} depth={} extent={}", e.node, e.depth, e.extent);
    }
}
