use anyhow::Result;

use deptgraph_core::SchemaRegistry;

pub fn run() -> Result<()> {
    let schema = SchemaRegistry::standard()?;

    println!("{:<14} {:<10} {}", "SOURCE", "RELATION", "TARGET");
    for rule in schema.rules() {
        println!(
            "{:<14} {:<10} {}",
            rule.source.as_str(),
            rule.relation.as_str(),
            rule.target.as_str()
        );
    }
    Ok(())
}
