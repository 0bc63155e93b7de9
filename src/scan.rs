use std::path::{Path, PathBuf};

use anyhow::Result;
use log::{error, info};
use regex::Regex;
use walkdir::WalkDir;

/// 默认扫描的图片后缀名
pub const DEFAULT_SUFFIXES: &str = "jpg,jpeg,png,bmp,webp";

/// 根据逗号分隔的后缀名构建大小写不敏感的匹配规则
pub fn suffix_regex(suffix: &str) -> Result<Regex> {
    let alternatives = suffix
        .split(',')
        .map(|s| s.trim().trim_start_matches('.'))
        .filter(|s| !s.is_empty())
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join("|");
    Ok(Regex::new(&format!("(?i)^({})$", alternatives))?)
}

/// 列出目录下（不含子目录）所有后缀名匹配的图片，按路径升序排列
///
/// 目录不存在时返回空列表
pub fn scan_images(dir: impl AsRef<Path>, re_suf: &Regex) -> Vec<PathBuf> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        error!("目录不存在: {}", dir.display());
        return vec![];
    }

    info!("开始扫描目录: {}", dir.display());
    let mut entries = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| {
            entry.ok().and_then(|entry| {
                let path = entry.into_path();
                if path.is_file() {
                    if let Some(ext) = path.extension() {
                        if re_suf.is_match(&ext.to_string_lossy()) {
                            return Some(path);
                        }
                    }
                }
                None
            })
        })
        .collect::<Vec<_>>();
    entries.sort();
    info!("扫描完成，共 {} 张图片", entries.len());

    entries
}

#[cfg(test)]
mod tests {
    use std::fs;

    use rstest::rstest;

    use super::*;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"x").unwrap();
    }

    #[rstest]
    #[case("a.jpg", true)]
    #[case("a.JPG", true)]
    #[case("a.Jpeg", true)]
    #[case("a.png", true)]
    #[case("a.bmp", true)]
    #[case("a.WEBP", true)]
    #[case("a.gif", false)]
    #[case("a.jpgx", false)]
    #[case("a.tar.jpg.txt", false)]
    #[case("jpg", false)]
    fn default_suffixes(#[case] name: &str, #[case] expected: bool) {
        let re = suffix_regex(DEFAULT_SUFFIXES).unwrap();
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), name);
        assert_eq!(scan_images(dir.path(), &re).len(), expected as usize);
    }

    #[test]
    fn sorted_and_not_recursive() {
        let re = suffix_regex(DEFAULT_SUFFIXES).unwrap();
        let dir = tempfile::tempdir().unwrap();
        for name in ["c.png", "a.jpg", "b.webp", "notes.txt"] {
            touch(dir.path(), name);
        }
        fs::create_dir(dir.path().join("nested.jpg")).unwrap();
        touch(&dir.path().join("nested.jpg"), "d.jpg");

        let names = scan_images(dir.path(), &re)
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect::<Vec<_>>();
        assert_eq!(names, ["a.jpg", "b.webp", "c.png"]);
    }

    #[test]
    fn missing_directory_yields_nothing() {
        let re = suffix_regex(DEFAULT_SUFFIXES).unwrap();
        let dir = tempfile::tempdir().unwrap();
        assert!(scan_images(dir.path().join("missing"), &re).is_empty());
    }

    #[test]
    fn custom_suffix_list() {
        let re = suffix_regex(" .PNG , tiff,").unwrap();
        assert!(re.is_match("png"));
        assert!(re.is_match("TIFF"));
        assert!(!re.is_match("jpg"));
    }
}
