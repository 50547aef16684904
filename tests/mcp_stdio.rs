use std::path::{Path, PathBuf};

use rmcp::{
    ServiceExt,
    model::CallToolRequestParams,
    transport::{ConfigureCommandExt, TokioChildProcess},
};
use serde_json::json;

fn setup_fixture(data_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = json!({
        "lastUpdated": "2025-12-01T00:00:00.000Z",
        "persons": [
            {
                "id": "ada-lovelace",
                "name": "Ada Lovelace",
                "category": "Science",
                "image": null,
                "appearances": [
                    {"file": "vol1/letters", "page": 1, "confidence": 99.95},
                    {"file": "vol1/notes", "page": 14, "confidence": 98.0}
                ]
            },
            {
                "id": "alan-turing",
                "name": "Alan Turing",
                "category": "Science",
                "image": null,
                "appearances": [
                    {"file": "vol1/letters", "page": 1, "confidence": 99.2}
                ]
            }
        ]
    });
    std::fs::write(
        data_dir.join("persons.json"),
        serde_json::to_string_pretty(&snapshot)?,
    )?;
    Ok(())
}

#[tokio::test]
async fn mcp_stdio_find_pages_roundtrip()
-> Result<(), Box<dyn std::error::Error>> {
    let tempdir = tempfile::tempdir()?;
    setup_fixture(tempdir.path())?;

    let bin = pagecard_bin()?;
    let transport = TokioChildProcess::new(
        tokio::process::Command::new(bin).configure(|cmd| {
            cmd.arg("mcp")
                .env("PAGECARD_DATA_DIR", tempdir.path())
                .env("PAGECARD_IMAGE_BASE_URL", "https://img.test");
        }),
    )?;

    let client = ().serve(transport).await?;

    let args = json!({
        "personIds": ["ada-lovelace", "alan-turing", "nobody"],
        "limit": 5
    });

    let result = client
        .peer()
        .call_tool(
            CallToolRequestParams::new("pagecard_find_pages")
                .with_arguments(args.as_object().unwrap().clone()),
        )
        .await?;

    let structured = result.structured_content.expect("structured content");
    let pages = structured
        .get("pages")
        .and_then(|v| v.as_array())
        .expect("pages array");

    assert_eq!(pages.len(), 2);
    assert_eq!(
        pages[0].get("file").and_then(|v| v.as_str()),
        Some("vol1/letters")
    );
    assert_eq!(pages[0].get("matchCount").and_then(|v| v.as_u64()), Some(2));
    assert_eq!(
        pages[0].get("imageUrl").and_then(|v| v.as_str()),
        Some("https://img.test/vol1/letters/page-001.jpg")
    );
    assert_eq!(
        structured.get("totalRequested").and_then(|v| v.as_u64()),
        Some(3)
    );

    let list_args = json!({ "search": "turing" });
    let list_result = client
        .peer()
        .call_tool(
            CallToolRequestParams::new("pagecard_list_persons")
                .with_arguments(list_args.as_object().unwrap().clone()),
        )
        .await?;
    let persons = list_result
        .structured_content
        .expect("structured content");
    assert_eq!(persons.get("total").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(
        persons["persons"][0].get("id").and_then(|v| v.as_str()),
        Some("alan-turing")
    );

    client.cancel().await?;
    Ok(())
}

fn pagecard_bin() -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Ok(bin) = std::env::var("CARGO_BIN_EXE_pagecard") {
        return Ok(PathBuf::from(bin));
    }

    let mut path = std::env::current_exe()?;
    path.pop();
    if path.ends_with("deps") {
        path.pop();
    }
    path.push("pagecard");

    if cfg!(windows) {
        path.set_extension("exe");
    }

    Ok(path)
}
