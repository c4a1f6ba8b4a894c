//! Document corpus: built-in demo documents and public PDF downloads

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use url::Url;

/// Built-in technical document
pub struct DemoDocument {
    pub name: &'static str,
    pub doc_type: &'static str,
    pub content: &'static str,
}

pub const DEMO_DOCUMENTS: [DemoDocument; 4] = [
    DemoDocument {
        name: "PROC-PUMP-MAINTENANCE-001.txt",
        doc_type: "procedure",
        content: include_str!("../../assets/docs/PROC-PUMP-MAINTENANCE-001.txt"),
    },
    DemoDocument {
        name: "SPEC-TEMPERATURE-SENSORS-002.txt",
        doc_type: "specification",
        content: include_str!("../../assets/docs/SPEC-TEMPERATURE-SENSORS-002.txt"),
    },
    DemoDocument {
        name: "RAPPORT-INSPECTION-SEMESTRIELLE-2024.txt",
        doc_type: "rapport",
        content: include_str!("../../assets/docs/RAPPORT-INSPECTION-SEMESTRIELLE-2024.txt"),
    },
    DemoDocument {
        name: "GUIDE-SURETE-DEFENSE-PROFONDEUR.txt",
        doc_type: "safety",
        content: include_str!("../../assets/docs/GUIDE-SURETE-DEFENSE-PROFONDEUR.txt"),
    },
];

/// Publicly downloadable reference PDF
pub struct PublicDocument {
    pub url: &'static str,
    pub name: &'static str,
    pub doc_type: &'static str,
    pub description: &'static str,
}

pub const PUBLIC_DOCUMENTS: [PublicDocument; 3] = [
    PublicDocument {
        url: "https://www.nrc.gov/docs/ML2220/ML22207A388.pdf",
        name: "NRC_Framatome_Inspection_2022.pdf",
        doc_type: "inspection",
        description: "NRC Inspection Report - Framatome Inc. Richland Facility",
    },
    PublicDocument {
        url: "https://www.framatome.com/app/uploads/2022/11/principles-of-conduct-en-2013.pdf",
        name: "Framatome_Principles_of_Conduct.pdf",
        doc_type: "policy",
        description: "Framatome Principles of Conduct",
    },
    PublicDocument {
        url: "https://www-pub.iaea.org/MTCD/Publications/PDF/Pub1716web-46541668.pdf",
        name: "IAEA_Safety_Standards_NS-R-2.pdf",
        doc_type: "safety",
        description: "IAEA Safety of Nuclear Power Plants: Design",
    },
];

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);
const DOWNLOAD_PAUSE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Serialize)]
pub struct CorpusSummary {
    pub total_documents: usize,
    pub demo_documents: usize,
    pub downloaded_documents: usize,
    pub output_directory: PathBuf,
    pub files: Vec<PathBuf>,
}

/// Write the demo documents, overwriting previous copies
pub fn create_demo_documents(dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create docs directory {:?}", dir))?;

    let mut created = Vec::new();
    for doc in &DEMO_DOCUMENTS {
        let path = dir.join(doc.name);
        match std::fs::write(&path, doc.content) {
            Ok(()) => {
                tracing::info!("Created {} ({})", doc.name, doc.doc_type);
                created.push(path);
            }
            Err(e) => tracing::warn!("Failed to create {}: {}", doc.name, e),
        }
    }
    Ok(created)
}

/// Fetch the public PDFs; existing files are kept, failures are logged
pub async fn download_public_documents(dir: &Path) -> Result<Vec<PathBuf>> {
    download_documents(dir, &PUBLIC_DOCUMENTS).await
}

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("reactor-chat/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

/// Download each document into `dir`, keeping files already present
pub async fn download_documents(dir: &Path, docs: &[PublicDocument]) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create docs directory {:?}", dir))?;

    let client = http_client(DOWNLOAD_TIMEOUT)?;

    let mut downloaded = Vec::new();
    for doc in docs {
        let path = dir.join(doc.name);
        if path.exists() {
            tracing::info!("{} already exists, skipping", doc.name);
            downloaded.push(path);
            continue;
        }

        tracing::info!("Downloading {} ({})", doc.name, doc.description);
        match fetch(&client, doc.url).await {
            Ok(bytes) => {
                tokio::fs::write(&path, &bytes)
                    .await
                    .with_context(|| format!("Failed to write {:?}", path))?;
                tracing::info!("Downloaded {} ({:.1} KB)", doc.name, bytes.len() as f64 / 1024.0);
                downloaded.push(path);
            }
            Err(e) => tracing::warn!("Failed to download {}: {:#}", doc.name, e),
        }

        tokio::time::sleep(DOWNLOAD_PAUSE).await;
    }
    Ok(downloaded)
}

pub(crate) async fn fetch(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    let url = Url::parse(url).with_context(|| format!("Invalid URL: {}", url))?;
    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("Unsupported URL scheme: {}", url.scheme());
    }
    tracing::debug!("Fetching from {}", url.host_str().unwrap_or("unknown host"));

    let response = client.get(url).send().await.context("HTTP request failed")?;
    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("HTTP {}", status);
    }
    let bytes = response.bytes().await.context("Failed to read response body")?;
    Ok(bytes.to_vec())
}

/// Demo documents always, public downloads on request
pub async fn setup_document_corpus(dir: &Path, include_downloads: bool) -> Result<CorpusSummary> {
    let demo = create_demo_documents(dir)?;
    let downloaded = if include_downloads {
        download_public_documents(dir).await?
    } else {
        Vec::new()
    };

    let mut files = demo.clone();
    files.extend(downloaded.iter().cloned());

    Ok(CorpusSummary {
        total_documents: files.len(),
        demo_documents: demo.len(),
        downloaded_documents: downloaded.len(),
        output_directory: dir.to_path_buf(),
        files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::categorize_doc;
    use tempfile::TempDir;

    #[test]
    fn test_public_document_urls_parse() {
        for doc in &PUBLIC_DOCUMENTS {
            let url = Url::parse(doc.url).unwrap();
            assert_eq!(url.scheme(), "https");
            assert!(doc.name.ends_with(".pdf"));
        }
    }

    #[tokio::test]
    async fn test_fetch_rejects_bad_urls() {
        let client = reqwest::Client::new();
        assert!(fetch(&client, "not a url").await.is_err());
        assert!(fetch(&client, "file:///etc/passwd").await.is_err());
    }

    #[tokio::test]
    async fn test_existing_downloads_are_kept() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(PUBLIC_DOCUMENTS[0].name), "%PDF").unwrap();

        let kept = download_documents(dir.path(), &PUBLIC_DOCUMENTS[..1])
            .await
            .unwrap();
        assert_eq!(kept, vec![dir.path().join(PUBLIC_DOCUMENTS[0].name)]);
        assert_eq!(
            std::fs::read_to_string(&kept[0]).unwrap(),
            "%PDF"
        );
    }

    #[test]
    fn test_demo_documents_match_categories() {
        for doc in &DEMO_DOCUMENTS {
            assert!(!doc.content.trim().is_empty());
            assert_eq!(categorize_doc(doc.name), doc.doc_type, "{}", doc.name);
        }
    }

    #[tokio::test]
    async fn test_setup_corpus_without_downloads() {
        let dir = TempDir::new().unwrap();
        let docs = dir.path().join("docs");

        let summary = setup_document_corpus(&docs, false).await.unwrap();
        assert_eq!(summary.demo_documents, 4);
        assert_eq!(summary.downloaded_documents, 0);
        assert_eq!(summary.total_documents, 4);

        let written = std::fs::read_to_string(docs.join("PROC-PUMP-MAINTENANCE-001.txt")).unwrap();
        assert!(written.contains("PROC-PUMP-001"));
    }
}
