use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

#[test]
fn build_writes_view_modules_and_page_data() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(
        dir.path().join("mdpress.yml"),
        r#"
site:
  title: "Test Docs"
  base: "docs"
"#,
    )?;
    fs::write(dir.path().join("index.md"), "---\nhome: true\n---\n\nSee [guide](./guide/).\n")?;
    fs::create_dir_all(dir.path().join("guide"))?;
    fs::write(
        dir.path().join("guide/index.md"),
        "# Guide <Badge/>\n\n## Install\n\n```sh{1}\nmdpress build\n```\n",
    )?;

    #[allow(deprecated)]
    Command::cargo_bin("mdpress")?
        .current_dir(dir.path())
        .arg("build")
        .assert()
        .success();

    let temp = dir.path().join(".mdpress/dist/.temp");
    let view = fs::read_to_string(temp.join("guide/index.md.vue"))?;
    assert!(view.contains("export const __pageData = "));
    assert!(view.contains("<template><div>"));
    assert!(view.contains(r#"<div class="highlight-lines">"#));

    let pages: serde_json::Value = serde_json::from_str(&fs::read_to_string(temp.join("pages.json"))?)?;
    let titles: Vec<&str> = pages
        .as_array()
        .ok_or("pages.json is not a list")?
        .iter()
        .filter_map(|page| page["title"].as_str())
        .collect();
    assert_eq!(titles, vec!["Guide", "Home"]);

    let site = fs::read_to_string(temp.join("siteData.js"))?;
    assert!(site.starts_with("export default \""));
    assert!(site.contains(r#"\"base\":\"/docs/\""#));
    Ok(())
}

#[test]
fn build_fails_once_on_dead_links() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("a.md"), "[missing](./nope.md)\n")?;
    fs::write(dir.path().join("b.md"), "[missing](/gone/)\n")?;

    #[allow(deprecated)]
    Command::cargo_bin("mdpress")?
        .current_dir(dir.path())
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("One or more pages contain dead links."))
        .stderr(predicate::str::contains("./nope.md"))
        .stderr(predicate::str::contains("/gone/"));

    // every page is still written before the build fails
    let temp = dir.path().join(".mdpress/dist/.temp");
    assert!(temp.join("a.md.vue").exists());
    assert!(temp.join("b.md.vue").exists());
    Ok(())
}

#[test]
fn routes_lists_generated_pages() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let src = dir.path().join("pkg");
    fs::create_dir_all(&src)?;
    fs::write(src.join("[name].md"), "# Package\n\n<!-- @content -->\n")?;
    fs::write(
        src.join("[name].paths.yml"),
        "paths:\n  - params: { name: core }\n  - params: { name: cli }\n    content: The CLI\n",
    )?;

    #[allow(deprecated)]
    let assert = Command::cargo_bin("mdpress")?
        .current_dir(dir.path())
        .args(["routes", "--json"])
        .assert()
        .success();

    let routes: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout)?;
    let paths: Vec<&str> = routes
        .as_array()
        .ok_or("routes output is not a list")?
        .iter()
        .filter_map(|route| route["path"].as_str())
        .collect();
    assert_eq!(paths, vec!["pkg/core.md", "pkg/cli.md"]);
    assert_eq!(routes[1]["content"], "The CLI");
    assert_eq!(routes[0]["route"], "pkg/[name].md");
    Ok(())
}

#[test]
fn routes_without_templates() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::write(dir.path().join("index.md"), "# Home\n")?;

    #[allow(deprecated)]
    Command::cargo_bin("mdpress")?
        .current_dir(dir.path())
        .arg("routes")
        .assert()
        .success()
        .stdout(predicate::str::contains("No dynamic routes."));
    Ok(())
}
