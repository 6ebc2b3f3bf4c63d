use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use log::debug;
use reqwest::blocking::Client;
use scraper::{Html, Selector};
use url::Url;

use crate::config::ScrapeOptions;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
const TIMEOUT: Duration = Duration::from_secs(30);

/// 条目级与会话级失败要区分处理：
/// 前者跳过当前条目即可，后者需要重置导航重放
#[derive(Debug)]
pub enum CatalogError {
    Item(anyhow::Error),
    Session(anyhow::Error),
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::Item(e) => write!(f, "条目失败: {e}"),
            CatalogError::Session(e) => write!(f, "会话失败: {e}"),
        }
    }
}

impl std::error::Error for CatalogError {}

/// 商品目录的导航契约。浏览器、HTTP 客户端或测试桩都可以实现。
pub trait Catalog {
    /// 进入目录根页面并打开品类列表，也用于会话重置
    fn open_category(&mut self) -> Result<()>;
    /// 翻到指定页，等价于站点的 goPage(n)
    fn go_page(&mut self, page_index: usize) -> Result<()>;
    /// 当前列表页的行数（含表头行）
    fn row_count(&mut self) -> Result<usize>;
    /// 打开第 row 行的详情页并提取商品图片地址
    fn item_image_url(&mut self, row: usize) -> Result<String, CatalogError>;
    /// 下载图片数据
    fn fetch_image(&mut self, url: &str) -> Result<Vec<u8>>;
    /// 保存出错现场，dest 不带扩展名，由实现决定格式
    fn save_error_snapshot(&mut self, dest: &Path) -> Result<()>;
}

/// 基于 HTTP 会话的目录实现：cookie 维持会话，CSS 选择器定位行和图片
pub struct HttpCatalog {
    client: Client,
    list_url: Url,
    category: String,
    row_selector: Selector,
    link_selector: Selector,
    img_selector: Selector,
    /// 当前列表页每一行的详情链接，表头等无链接的行为 None
    rows: Vec<Option<Url>>,
    /// 最近一次获取的页面内容，用于错误快照
    last_body: String,
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| anyhow!("无效的 CSS 选择器 {s}: {e}"))
}

impl HttpCatalog {
    pub fn new(opts: &ScrapeOptions) -> Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .timeout(TIMEOUT)
            .build()?;
        let base = Url::parse(&opts.base_url)
            .with_context(|| format!("无效的站点地址: {}", opts.base_url))?;
        let list_url = base.join(&opts.list_path)?;
        Ok(Self {
            client,
            list_url,
            category: opts.category.clone(),
            row_selector: parse_selector(&opts.row_selector)?,
            link_selector: parse_selector(&opts.link_selector)?,
            img_selector: parse_selector(&opts.img_selector)?,
            rows: vec![],
            last_body: String::new(),
        })
    }

    fn get(&mut self, url: Url) -> Result<String> {
        debug!("GET {url}");
        let body = self.client.get(url).send()?.error_for_status()?.text()?;
        Ok(body)
    }

    fn load_list(&mut self, url: Url) -> Result<()> {
        let body = self.get(url)?;
        let doc = Html::parse_document(&body);
        self.rows = doc
            .select(&self.row_selector)
            .map(|row| {
                row.select(&self.link_selector)
                    .next()
                    .and_then(|a| a.value().attr("href"))
                    .and_then(|href| self.list_url.join(href).ok())
            })
            .collect();
        self.last_body = body;
        debug!("列表页共 {} 行", self.rows.len());
        Ok(())
    }

    fn list_page_url(&self, page_index: Option<usize>) -> Url {
        let mut url = self.list_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("categoryCd", &self.category);
            if let Some(page) = page_index {
                query.append_pair("page", &page.to_string());
            }
        }
        url
    }
}

impl Catalog for HttpCatalog {
    fn open_category(&mut self) -> Result<()> {
        // 先访问目录根页面建立会话 cookie，再进入品类列表
        self.get(self.list_url.clone())?;
        self.load_list(self.list_page_url(None))
    }

    fn go_page(&mut self, page_index: usize) -> Result<()> {
        self.load_list(self.list_page_url(Some(page_index)))
    }

    fn row_count(&mut self) -> Result<usize> {
        Ok(self.rows.len())
    }

    fn item_image_url(&mut self, row: usize) -> Result<String, CatalogError> {
        let Some(link) = self.rows.get(row).cloned().flatten() else {
            return Err(CatalogError::Item(anyhow!("第 {row} 行没有详情链接")));
        };
        // 详情页请求失败视为会话级问题，解析不到图片才是条目级问题
        let body = self.get(link).map_err(CatalogError::Session)?;
        let doc = Html::parse_document(&body);
        let src = doc
            .select(&self.img_selector)
            .next()
            .and_then(|img| img.value().attr("src"))
            .map(|src| src.to_string());
        self.last_body = body;

        match src {
            Some(src) => self
                .list_url
                .join(&src)
                .map(|url| url.to_string())
                .map_err(|e| CatalogError::Item(e.into())),
            None => Err(CatalogError::Item(anyhow!("详情页中没有商品图片"))),
        }
    }

    fn fetch_image(&mut self, url: &str) -> Result<Vec<u8>> {
        let bytes = self.client.get(url).send()?.error_for_status()?.bytes()?;
        Ok(bytes.to_vec())
    }

    fn save_error_snapshot(&mut self, dest: &Path) -> Result<()> {
        let dest = dest.with_extension("html");
        fs::write(&dest, &self.last_body)
            .with_context(|| format!("保存错误快照失败: {}", dest.display()))?;
        Ok(())
    }
}

impl Drop for HttpCatalog {
    // 会话随对象释放，任何退出路径都会走到这里
    fn drop(&mut self) {
        debug!("HTTP 会话已关闭");
    }
}
