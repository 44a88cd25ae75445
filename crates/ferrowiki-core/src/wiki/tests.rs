use super::*;
use crate::vfs::PhysicalFileSystem;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

fn create_test_wiki() -> (Wiki, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let wiki = Wiki::new(temp_dir.path());
    (wiki, temp_dir)
}

fn write_page(root: &Path, rel: &str, title: &str, tags: &str, body: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, format!("title: {}\ntags: {}\n\n{}", title, tags, body)).unwrap();
}

#[test]
fn test_path_and_exists() {
    let (wiki, temp_dir) = create_test_wiki();
    assert_eq!(wiki.path("sub/page"), temp_dir.path().join("sub/page.md"));
    assert!(!wiki.exists("sub/page"));

    write_page(temp_dir.path(), "sub/page.md", "P", "", "body");
    assert!(wiki.exists("sub/page"));
}

#[test]
fn test_get_returns_none_for_missing_page() {
    let (wiki, _temp_dir) = create_test_wiki();
    assert!(wiki.get("ghost").unwrap().is_none());
    assert!(matches!(
        wiki.get_or_fail("ghost"),
        Err(WikiError::NotFound(id)) if id == "ghost"
    ));
}

#[test]
fn test_get_loads_and_parses() {
    let (wiki, temp_dir) = create_test_wiki();
    write_page(temp_dir.path(), "home.md", "Home", "intro", "Welcome to [[sub/page|Sub]].");

    let page = wiki.get("home").unwrap().unwrap();
    assert_eq!(page.url(), "home");
    assert_eq!(page.title(), "Home");
    assert!(
        page.html().contains("<a href=\"/sub/page/\">Sub</a>"),
        "wikilinks should resolve during parse: {}",
        page.html()
    );
}

#[test]
fn test_get_new_conflicts_on_existing_page() {
    let (wiki, temp_dir) = create_test_wiki();
    write_page(temp_dir.path(), "taken.md", "Taken", "", "body");

    assert!(matches!(
        wiki.get_new("taken"),
        Err(WikiError::Conflict(id)) if id == "taken"
    ));

    let page = wiki.get_new("free").unwrap();
    assert_eq!(page.url(), "free");
    assert!(!wiki.exists("free"), "get_new must not create the file");
}

#[test]
fn test_save_through_repository_round_trips() {
    let (wiki, _temp_dir) = create_test_wiki();

    let mut page = wiki.get_new("notes/today").unwrap();
    page.set_title("Today");
    page.set_tags("diary, notes");
    page.set_body("Some *markdown*.");
    wiki.save(&mut page).unwrap();

    let loaded = wiki.get_or_fail("notes/today").unwrap();
    assert_eq!(loaded.title(), "Today");
    assert_eq!(loaded.tags(), "diary, notes");
    assert_eq!(loaded.body, "Some *markdown*.");
    assert!(loaded.html().contains("<em>markdown</em>"));
}

#[test]
fn test_move_page_renames_file() {
    let (wiki, temp_dir) = create_test_wiki();
    write_page(temp_dir.path(), "old.md", "Old", "", "content");

    wiki.move_page("old", "archive/new").unwrap();

    assert!(!wiki.exists("old"));
    let moved = wiki.get_or_fail("archive/new").unwrap();
    assert_eq!(moved.url(), "archive/new");
    assert_eq!(moved.body, "content");
}

#[test]
fn test_move_page_missing_source() {
    let (wiki, _temp_dir) = create_test_wiki();
    assert!(matches!(
        wiki.move_page("ghost", "anywhere"),
        Err(WikiError::NotFound(id)) if id == "ghost"
    ));
}

#[test]
fn test_move_page_never_clobbers_destination() {
    let (wiki, temp_dir) = create_test_wiki();
    write_page(temp_dir.path(), "a.md", "A", "", "a body");
    write_page(temp_dir.path(), "b.md", "B", "", "b body");

    assert!(matches!(
        wiki.move_page("a", "b"),
        Err(WikiError::Conflict(id)) if id == "b"
    ));
    assert_eq!(
        wiki.get_or_fail("b").unwrap().body,
        "b body",
        "destination must be untouched after a refused move"
    );
}

#[test]
fn test_delete_is_a_no_op_when_absent() {
    let (wiki, temp_dir) = create_test_wiki();
    write_page(temp_dir.path(), "doomed.md", "Doomed", "", "body");

    assert!(wiki.delete("doomed").unwrap());
    assert!(!wiki.exists("doomed"));
    assert!(!wiki.delete("doomed").unwrap());
}

#[test]
fn test_index_sorts_by_case_insensitive_title() {
    let (wiki, temp_dir) = create_test_wiki();
    write_page(temp_dir.path(), "one.md", "Banana", "", "");
    write_page(temp_dir.path(), "two.md", "apple", "", "");
    write_page(temp_dir.path(), "three.md", "Cherry", "", "");

    let titles: Vec<String> = wiki
        .index()
        .unwrap()
        .iter()
        .map(|p| p.title().to_string())
        .collect();
    assert_eq!(titles, vec!["apple", "Banana", "Cherry"]);
}

#[test]
fn test_index_derives_nested_identifiers() {
    let (wiki, temp_dir) = create_test_wiki();
    write_page(temp_dir.path(), "a/b/c.md", "Deep", "", "");
    write_page(temp_dir.path(), "top.md", "Top", "", "");

    let mut urls: Vec<String> = wiki
        .index()
        .unwrap()
        .iter()
        .map(|p| p.url().to_string())
        .collect();
    urls.sort();
    assert_eq!(urls, vec!["a/b/c", "top"]);
}

#[test]
fn test_index_strips_exactly_one_extension() {
    let (wiki, temp_dir) = create_test_wiki();
    write_page(temp_dir.path(), "a.md.md", "Doubled", "", "body");

    let pages = wiki.index().unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!(
        pages[0].url(),
        "a.md",
        "identifier must be the relative path minus one extension"
    );

    // The derived identifier must round-trip through path resolution.
    let page = wiki.get_or_fail("a.md").unwrap();
    assert_eq!(page.body, "body");
}

#[test]
fn test_index_ignores_other_extensions() {
    let (wiki, temp_dir) = create_test_wiki();
    write_page(temp_dir.path(), "page.md", "Page", "", "");
    fs::write(temp_dir.path().join("image.png"), b"\x89PNG").unwrap();
    fs::write(temp_dir.path().join("notes.txt"), "not a page").unwrap();

    assert_eq!(wiki.index().unwrap().len(), 1);
}

#[test]
fn test_index_title_falls_back_to_url() {
    let (wiki, temp_dir) = create_test_wiki();
    fs::write(temp_dir.path().join("bare.md"), "just a body").unwrap();

    let pages = wiki.index().unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].title(), "bare");
}

#[test]
fn test_tags_aggregation_trims_and_drops_empty_tokens() {
    let (wiki, temp_dir) = create_test_wiki();
    write_page(temp_dir.path(), "p.md", "P", "x, y ,  z", "");
    write_page(temp_dir.path(), "q.md", "Q", "y,,", "");

    let tags = wiki.tags().unwrap();
    let names: Vec<&String> = tags.keys().collect();
    assert_eq!(names, vec!["x", "y", "z"]);
    assert_eq!(tags["y"].len(), 2, "both pages carry tag y");
    assert!(
        !tags.contains_key(""),
        "empty tokens must never become tags"
    );
}

#[test]
fn test_pages_by_tag_uses_substring_containment() {
    let (wiki, temp_dir) = create_test_wiki();
    write_page(temp_dir.path(), "pet.md", "Pet", "cat", "");

    // Containment, not token equality: "a" is inside "cat".
    let pages = wiki.pages_by_tag("a").unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].title(), "Pet");

    assert!(wiki.pages_by_tag("dog").unwrap().is_empty());
}

#[test]
fn test_search_matches_title_tags_and_body() {
    let (wiki, temp_dir) = create_test_wiki();
    write_page(temp_dir.path(), "a.md", "Alpha", "", "nothing here");
    write_page(temp_dir.path(), "b.md", "B", "alpha, beta", "nothing here");
    write_page(temp_dir.path(), "c.md", "C", "", "alpha in the body");
    write_page(temp_dir.path(), "d.md", "D", "", "unrelated");

    let results = wiki.search("alpha", true).unwrap();
    assert_eq!(results.len(), 3);

    let titles: Vec<&str> = results.iter().map(|p| p.title()).collect();
    assert_eq!(
        titles,
        vec!["Alpha", "B", "C"],
        "search keeps index (title) order"
    );
}

#[test]
fn test_search_case_sensitivity_flag() {
    let (wiki, temp_dir) = create_test_wiki();
    write_page(temp_dir.path(), "a.md", "Alpha", "", "");

    assert_eq!(wiki.search("alpha", true).unwrap().len(), 1);
    assert!(wiki.search("alpha", false).unwrap().is_empty());
    assert_eq!(wiki.search("Alpha", false).unwrap().len(), 1);
}

#[test]
fn test_search_accepts_regex_terms() {
    let (wiki, temp_dir) = create_test_wiki();
    write_page(temp_dir.path(), "a.md", "Release 1.2", "", "");
    write_page(temp_dir.path(), "b.md", "Release 3", "", "");

    let results = wiki.search(r"Release \d\.\d", true).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].title(), "Release 1.2");

    assert!(matches!(
        wiki.search("[unclosed", true),
        Err(WikiError::Pattern(_))
    ));
}

#[test]
fn test_search_fields_restricts_scope() {
    let (wiki, temp_dir) = create_test_wiki();
    write_page(temp_dir.path(), "a.md", "needle", "", "haystack");
    write_page(temp_dir.path(), "b.md", "haystack", "", "needle");

    let results = wiki
        .search_fields("needle", true, &[SearchField::Title])
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].title(), "needle");
}

#[derive(Default)]
struct CountingFs {
    inner: PhysicalFileSystem,
    reads: AtomicUsize,
}

impl FileSystem for CountingFs {
    fn read_to_string(&self, path: &Path) -> std::io::Result<String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read_to_string(path)
    }

    fn write(&self, path: &Path, contents: &str) -> std::io::Result<()> {
        self.inner.write(path, contents)
    }

    fn rename(&self, from: &Path, to: &Path) -> std::io::Result<()> {
        self.inner.rename(from, to)
    }

    fn remove_file(&self, path: &Path) -> std::io::Result<()> {
        self.inner.remove_file(path)
    }

    fn create_dir_all(&self, path: &Path) -> std::io::Result<()> {
        self.inner.create_dir_all(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.inner.exists(path)
    }

    fn stamp(&self, path: &Path) -> std::io::Result<FileStamp> {
        self.inner.stamp(path)
    }

    fn list_files(&self, root: &Path, extension: &str) -> Vec<PathBuf> {
        self.inner.list_files(root, extension)
    }
}

#[test]
fn test_index_reparses_only_changed_files() {
    let temp_dir = TempDir::new().unwrap();
    let fs = Arc::new(CountingFs::default());
    let wiki = Wiki::with_fs(temp_dir.path(), fs.clone());

    write_page(temp_dir.path(), "a.md", "A", "", "one");
    write_page(temp_dir.path(), "b.md", "B", "", "two");

    wiki.index().unwrap();
    assert_eq!(fs.reads.load(Ordering::SeqCst), 2, "first walk parses all");

    wiki.index().unwrap();
    assert_eq!(
        fs.reads.load(Ordering::SeqCst),
        2,
        "unchanged files are served from the cache"
    );

    write_page(temp_dir.path(), "a.md", "A", "", "one, but longer now");
    wiki.index().unwrap();
    assert_eq!(
        fs.reads.load(Ordering::SeqCst),
        3,
        "only the changed file is reparsed"
    );
}

#[test]
fn test_index_sees_out_of_band_deletes() {
    let (wiki, temp_dir) = create_test_wiki();
    write_page(temp_dir.path(), "a.md", "A", "", "");
    write_page(temp_dir.path(), "b.md", "B", "", "");

    assert_eq!(wiki.index().unwrap().len(), 2);

    fs::remove_file(temp_dir.path().join("a.md")).unwrap();
    assert_eq!(wiki.index().unwrap().len(), 1);
}
