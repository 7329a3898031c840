use std::{collections::BTreeSet, path::Path};

use anyhow::Context as _;

use crate::{config::DataLayout, error::MotionvizResult};

pub const PAGE_SIZE: usize = 16;
const COLUMNS: usize = 4;

/// Filenames eligible for the gallery: present as both an animation and a
/// thumbnail. Sorted, so page assignment is stable across runs.
pub fn collect_entries(layout: &DataLayout) -> MotionvizResult<Vec<String>> {
    let vids = gif_names(&layout.vid_dir())?;
    let thumbs = gif_names(&layout.thumb_dir())?;
    Ok(vids.intersection(&thumbs).cloned().collect())
}

fn gif_names(dir: &Path) -> MotionvizResult<BTreeSet<String>> {
    let mut out = BTreeSet::new();
    if !dir.is_dir() {
        return Ok(out);
    }
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("read directory '{}'", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("read directory '{}'", dir.display()))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.ends_with(".gif") {
            out.insert(name.to_string());
        }
    }
    Ok(out)
}

/// Page 0 is the index document; later pages are numbered.
pub fn page_file_name(page: usize) -> String {
    if page == 0 {
        "README.md".to_string()
    } else {
        format!("gal_{page}.md")
    }
}

/// Render one page: navigation line plus a 4x4 table of thumbnails linking
/// to the full animations. Unused trailing cells stay empty.
pub fn render_page(entries: &[String], page: usize, page_count: usize) -> String {
    let mut out = String::new();
    out.push_str("# Scenario gallery\n\n");

    let mut nav = Vec::new();
    if page > 0 {
        nav.push(format!("[previous]({})", page_file_name(page - 1)));
    }
    nav.push(format!("page {} of {page_count}", page + 1));
    if page + 1 < page_count {
        nav.push(format!("[next]({})", page_file_name(page + 1)));
    }
    out.push_str(&nav.join(" | "));
    out.push_str("\n\n");

    out.push_str(&format!("|{}\n", " |".repeat(COLUMNS)));
    out.push_str(&format!("|{}\n", "---|".repeat(COLUMNS)));
    for row in 0..PAGE_SIZE / COLUMNS {
        out.push('|');
        for col in 0..COLUMNS {
            match entries.get(row * COLUMNS + col) {
                Some(name) => {
                    out.push_str(&format!(" [![{name}](thumb/{name})](vid/{name}) |"));
                }
                None => out.push_str(" |"),
            }
        }
        out.push('\n');
    }

    out
}

/// Regenerate every gallery page under the data directory. Returns the
/// number of pages written; an empty gallery still gets its index page.
pub fn generate_gallery(layout: &DataLayout) -> MotionvizResult<usize> {
    let entries = collect_entries(layout)?;
    let page_count = entries.len().div_ceil(PAGE_SIZE).max(1);

    let data_dir = layout.data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("create directory '{}'", data_dir.display()))?;

    for page in 0..page_count {
        let start = page * PAGE_SIZE;
        let end = (start + PAGE_SIZE).min(entries.len());
        let body = render_page(&entries[start..end], page, page_count);
        let path = data_dir.join(page_file_name(page));
        std::fs::write(&path, body)
            .with_context(|| format!("write gallery page '{}'", path.display()))?;
    }

    tracing::info!(
        entries = entries.len(),
        pages = page_count,
        "gallery regenerated"
    );
    Ok(page_count)
}
