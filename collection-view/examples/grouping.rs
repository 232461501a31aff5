// Example: group files by extension, patch the tree, and walk the selection.
use collection_view::{
    CollectionView, CollectionViewOptions, GroupByItem, GroupMode, SelectionModifiers,
    ViewMode,
};

fn main() {
    let options = CollectionViewOptions::new(
        |name: &&'static str, _: ViewMode, _: bool| 8 * name.len() as u32,
        |a: &&'static str, b: &&'static str| a.cmp(b),
    )
    .with_label("folder", "Pictures")
    .with_item_border_size(2);
    let mut v = CollectionView::new(options).expect("one view mode");
    v.set_visible(true);
    let root = v.root();
    v.set_width(root, 200);

    let by_kind = vec![
        GroupByItem::new("jpg", |n: &&'static str| n.ends_with(".jpg")),
        GroupByItem::new("png", |n: &&'static str| n.ends_with(".png")),
    ];
    let files = vec!["beach.jpg", "cat.png", "dog.png", "forest.jpg", "icon.png", "sunset.jpg"];
    v.reload(files, GroupMode::GroupBy, &by_kind, true, true);

    for g in v.layout_snapshot().groups {
        println!("{}{} {:?} rows={:?}", "  ".repeat(g.depth), g.label, g.source, g.rows);
    }

    v.insert(&["moon.jpg"]);
    v.remove(&["cat.png"]);
    println!("after insert/remove:");
    for g in v.layout_snapshot().leaves() {
        println!("  {} {:?}", g.label, g.source);
    }

    let first = v.select_first_item();
    println!("first={first:?} position={}", v.position_slash_count());
    while let Some(item) = v.select_next_item(false, false) {
        println!("next={item} position={}", v.position_slash_count());
    }

    if let Some(row) = v.last_selected_row() {
        let group = v.group(row.group).expect("selected group");
        let item = group.rows()[row.index].leaves()[0];
        v.select_item(row, &item, SelectionModifiers { ctrl: true, shift: false });
        println!("reselected {item} in {}", v.group_label(row.group));
    }
}
