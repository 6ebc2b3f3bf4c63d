mod catalog;
mod matting;

pub use catalog::{Catalog, CatalogError, HttpCatalog};
pub use matting::{BackgroundRemover, ImageSink, MattingSink};

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use log::{info, warn};

/// 一次抓取的统计结果
#[derive(Debug, Default, Clone, Copy)]
pub struct ScrapeStats {
    pub pages: usize,
    pub saved: usize,
    pub skipped: usize,
    pub resets: usize,
}

enum ItemOutcome {
    Saved(PathBuf),
    Skipped,
}

/// 遍历目录分页抓取商品图片：
/// 条目失败保存现场后继续，会话失败重置导航并重放到当前页，
/// 重放再失败则提前结束。翻到空页或达到 max_pages 时停止。
pub fn run(
    catalog: &mut dyn Catalog,
    sink: &mut dyn ImageSink,
    output_dir: &Path,
    max_pages: usize,
) -> Result<ScrapeStats> {
    fs::create_dir_all(output_dir)?;
    catalog.open_category()?;

    let mut stats = ScrapeStats::default();
    'pages: for page_index in 0..max_pages {
        let page = page_index + 1;
        if page_index > 0 {
            if let Err(e) = catalog.go_page(page_index) {
                warn!("翻页到第 {page} 页失败，结束抓取: {e}");
                break;
            }
        }

        let rows = match catalog.row_count() {
            Ok(rows) => rows,
            Err(e) => {
                warn!("获取第 {page} 页列表失败: {e}");
                stats.resets += 1;
                if replay(catalog, page_index).is_err() {
                    warn!("会话恢复失败，提前结束抓取");
                    break;
                }
                match catalog.row_count() {
                    Ok(rows) => rows,
                    Err(e) => {
                        warn!("重放后仍无法获取列表，提前结束抓取: {e}");
                        break;
                    }
                }
            }
        };
        if rows == 0 {
            info!("第 {page} 页没有条目，结束抓取");
            break;
        }
        stats.pages = page;

        // 第 0 行是表头
        for row in 1..rows {
            // 列表可能在遍历过程中变化，重新确认行数
            if let Ok(current) = catalog.row_count() {
                if row >= current {
                    break;
                }
            }

            match process_item(catalog, sink, output_dir, page, row) {
                Ok(ItemOutcome::Saved(path)) => {
                    stats.saved += 1;
                    info!("已保存 {}", path.display());
                }
                Ok(ItemOutcome::Skipped) => stats.skipped += 1,
                Err(e) => {
                    warn!("第 {page} 页第 {row} 行会话失败: {e}");
                    stats.resets += 1;
                    if replay(catalog, page_index).is_err() {
                        warn!("会话恢复失败，提前结束抓取");
                        break 'pages;
                    }
                }
            }
        }
    }

    Ok(stats)
}

/// 返回 Err 表示会话级失败，需要上层重置导航
fn process_item(
    catalog: &mut dyn Catalog,
    sink: &mut dyn ImageSink,
    output_dir: &Path,
    page: usize,
    row: usize,
) -> Result<ItemOutcome> {
    let item = row + 1;
    let url = match catalog.item_image_url(row) {
        Ok(url) => url,
        Err(CatalogError::Item(e)) => {
            warn!("第 {page} 页第 {row} 行提取图片失败: {e}");
            let stem = output_dir.join(format!("error_p{page}_item{item}"));
            if let Err(e) = catalog.save_error_snapshot(&stem) {
                warn!("保存错误快照失败: {e}");
            }
            return Ok(ItemOutcome::Skipped);
        }
        Err(CatalogError::Session(e)) => return Err(e),
    };

    let bytes = match catalog.fetch_image(&url) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("下载 {url} 失败: {e}");
            return Ok(ItemOutcome::Skipped);
        }
    };

    let dest = output_dir.join(format!("page{page}_item{item}.png"));
    match sink.save(&bytes, &dest) {
        Ok(()) => Ok(ItemOutcome::Saved(dest)),
        Err(e) => {
            warn!("处理 {} 失败: {e}", dest.display());
            Ok(ItemOutcome::Skipped)
        }
    }
}

/// 重置会话：回到目录首页并重放导航到上次的页码
fn replay(catalog: &mut dyn Catalog, page_index: usize) -> Result<()> {
    info!("重置会话，重放导航到第 {} 页", page_index + 1);
    catalog.open_category()?;
    if page_index > 0 {
        catalog.go_page(page_index)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;

    #[derive(Clone, Copy)]
    enum Row {
        Header,
        Image(&'static str),
        NoImage,
        SessionLoss,
    }

    struct MockCatalog {
        pages: Vec<Vec<Row>>,
        current: usize,
        open_calls: usize,
        go_page_calls: Vec<usize>,
        /// 从第 N 次 open_category 开始失败
        fail_open_from: Option<usize>,
        /// 翻页直接失败
        fail_go_page: bool,
    }

    impl MockCatalog {
        fn new(pages: Vec<Vec<Row>>) -> Self {
            Self {
                pages,
                current: 0,
                open_calls: 0,
                go_page_calls: vec![],
                fail_open_from: None,
                fail_go_page: false,
            }
        }

        fn rows(&self) -> &[Row] {
            self.pages.get(self.current).map(|p| p.as_slice()).unwrap_or(&[])
        }
    }

    impl Catalog for MockCatalog {
        fn open_category(&mut self) -> Result<()> {
            self.open_calls += 1;
            if let Some(n) = self.fail_open_from {
                if self.open_calls >= n {
                    return Err(anyhow!("目录页打不开"));
                }
            }
            self.current = 0;
            Ok(())
        }

        fn go_page(&mut self, page_index: usize) -> Result<()> {
            if self.fail_go_page {
                return Err(anyhow!("goPage 失败"));
            }
            self.go_page_calls.push(page_index);
            self.current = page_index;
            Ok(())
        }

        fn row_count(&mut self) -> Result<usize> {
            Ok(self.rows().len())
        }

        fn item_image_url(&mut self, row: usize) -> Result<String, CatalogError> {
            match self.rows().get(row) {
                Some(Row::Image(url)) => Ok(url.to_string()),
                Some(Row::SessionLoss) => {
                    Err(CatalogError::Session(anyhow!("stale element")))
                }
                Some(Row::Header) | Some(Row::NoImage) | None => {
                    Err(CatalogError::Item(anyhow!("没有图片")))
                }
            }
        }

        fn fetch_image(&mut self, url: &str) -> Result<Vec<u8>> {
            Ok(url.as_bytes().to_vec())
        }

        fn save_error_snapshot(&mut self, dest: &Path) -> Result<()> {
            fs::write(dest.with_extension("png"), b"snapshot")?;
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockSink {
        saved: Vec<PathBuf>,
        fail: bool,
    }

    impl ImageSink for MockSink {
        fn save(&mut self, bytes: &[u8], dest: &Path) -> Result<()> {
            if self.fail {
                return Err(anyhow!("去背景失败"));
            }
            fs::write(dest, bytes)?;
            self.saved.push(dest.to_path_buf());
            Ok(())
        }
    }

    fn names(paths: &[PathBuf]) -> Vec<String> {
        paths.iter().map(|p| p.file_name().unwrap().to_string_lossy().to_string()).collect()
    }

    #[test]
    fn walks_pages_until_empty() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut catalog = MockCatalog::new(vec![
            vec![Row::Header, Row::Image("a.jpg"), Row::Image("b.jpg")],
            vec![Row::Header, Row::Image("c.jpg")],
            vec![],
        ]);
        let mut sink = MockSink::default();

        let stats = run(&mut catalog, &mut sink, dir.path(), 10)?;
        assert_eq!(stats.pages, 2);
        assert_eq!(stats.saved, 3);
        assert_eq!(stats.skipped, 0);
        assert_eq!(stats.resets, 0);
        assert_eq!(names(&sink.saved), ["page1_item2.png", "page1_item3.png", "page2_item2.png"]);
        assert_eq!(catalog.go_page_calls, [1, 2]);
        assert_eq!(catalog.open_calls, 1);
        Ok(())
    }

    #[test]
    fn item_failure_writes_snapshot_and_continues() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut catalog = MockCatalog::new(vec![
            vec![Row::Header, Row::NoImage, Row::Image("ok.jpg")],
            vec![],
        ]);
        let mut sink = MockSink::default();

        let stats = run(&mut catalog, &mut sink, dir.path(), 10)?;
        assert_eq!(stats.saved, 1);
        assert_eq!(stats.skipped, 1);
        assert!(dir.path().join("error_p1_item2.png").exists());
        assert_eq!(names(&sink.saved), ["page1_item3.png"]);
        Ok(())
    }

    #[test]
    fn session_loss_resets_and_replays() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut catalog = MockCatalog::new(vec![
            vec![Row::Header, Row::SessionLoss, Row::Image("ok.jpg")],
            vec![],
        ]);
        let mut sink = MockSink::default();

        let stats = run(&mut catalog, &mut sink, dir.path(), 10)?;
        assert_eq!(stats.resets, 1);
        assert_eq!(stats.saved, 1);
        // 初次进入 + 一次重置
        assert_eq!(catalog.open_calls, 2);
        Ok(())
    }

    #[test]
    fn failed_replay_ends_run_gracefully() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut catalog = MockCatalog::new(vec![
            vec![Row::Header, Row::SessionLoss, Row::Image("ok.jpg")],
            vec![Row::Header, Row::Image("never.jpg")],
        ]);
        catalog.fail_open_from = Some(2);
        let mut sink = MockSink::default();

        let stats = run(&mut catalog, &mut sink, dir.path(), 10)?;
        assert_eq!(stats.resets, 1);
        assert_eq!(stats.saved, 0);
        assert!(catalog.go_page_calls.is_empty());
        Ok(())
    }

    #[test]
    fn go_page_failure_stops_pagination() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut catalog = MockCatalog::new(vec![
            vec![Row::Header, Row::Image("a.jpg")],
            vec![Row::Header, Row::Image("b.jpg")],
        ]);
        catalog.fail_go_page = true;
        let mut sink = MockSink::default();

        let stats = run(&mut catalog, &mut sink, dir.path(), 10)?;
        assert_eq!(stats.pages, 1);
        assert_eq!(stats.saved, 1);
        Ok(())
    }

    #[test]
    fn sink_failure_skips_item() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut catalog =
            MockCatalog::new(vec![vec![Row::Header, Row::Image("a.jpg")], vec![]]);
        let mut sink = MockSink { fail: true, ..Default::default() };

        let stats = run(&mut catalog, &mut sink, dir.path(), 10)?;
        assert_eq!(stats.saved, 0);
        assert_eq!(stats.skipped, 1);
        Ok(())
    }

    #[test]
    fn respects_max_pages() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut catalog = MockCatalog::new(vec![
            vec![Row::Header, Row::Image("a.jpg")],
            vec![Row::Header, Row::Image("b.jpg")],
            vec![Row::Header, Row::Image("c.jpg")],
        ]);
        let mut sink = MockSink::default();

        let stats = run(&mut catalog, &mut sink, dir.path(), 2)?;
        assert_eq!(stats.pages, 2);
        assert_eq!(stats.saved, 2);
        Ok(())
    }
}
