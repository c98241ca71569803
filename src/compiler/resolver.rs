use std::path::{Component, Path, PathBuf};

/// 组件文件路径：引用方所在目录 + 标签名（不推断扩展名，区分大小写）
pub fn resolve(source: &Path, tag: &str) -> PathBuf {
    match source.parent() {
        Some(dir) => dir.join(tag),
        None => PathBuf::from(tag),
    }
}

/// 标签对应的组件文件存在时返回其路径。
///
/// 每次调用都重新检查文件系统，不做缓存；不存在的组件只是普通标签。
pub fn find_component(source: &Path, tag: &str) -> Option<PathBuf> {
    if tag == "slot" || !is_plain_name(tag) {
        return None;
    }
    let path = resolve(source, tag);
    path.is_file().then_some(path)
}

/// 标签名只能指向同目录文件，不允许借助分隔符或 `..` 跳出
fn is_plain_name(tag: &str) -> bool {
    let mut components = Path::new(tag).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn resolves_sibling_verbatim() {
        assert_eq!(
            resolve(Path::new("site/pages/index.html"), "nav-bar"),
            PathBuf::from("site/pages/nav-bar")
        );
        assert_eq!(resolve(Path::new("index.html"), "box"), PathBuf::from("box"));
    }

    #[test]
    fn finds_existing_file_only() {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("index.html");
        fs::write(dir.path().join("card"), "<div></div>").unwrap();
        fs::create_dir(dir.path().join("section")).unwrap();

        assert_eq!(find_component(&index, "card"), Some(dir.path().join("card")));
        assert_eq!(find_component(&index, "missing"), None);
        // 同名目录不是组件
        assert_eq!(find_component(&index, "section"), None);
    }

    #[test]
    fn existence_is_checked_each_time() {
        let dir = tempfile::tempdir().unwrap();
        let index = dir.path().join("index.html");
        assert_eq!(find_component(&index, "late"), None);
        fs::write(dir.path().join("late"), "").unwrap();
        assert!(find_component(&index, "late").is_some());
    }

    #[test]
    fn slot_and_escaping_names_are_never_components() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("pages");
        fs::create_dir(&nested).unwrap();
        fs::write(dir.path().join("slot"), "").unwrap();
        fs::write(dir.path().join("outer"), "").unwrap();

        assert_eq!(find_component(&dir.path().join("index.html"), "slot"), None);
        assert_eq!(find_component(&nested.join("index.html"), ".."), None);
        assert_eq!(find_component(&nested.join("index.html"), "../outer"), None);
    }
}
