//! Print the JSON schema of the desired-state record as YAML.
//!
//! Used by the front-end tooling to validate configuration before calling
//! the engine.

use vm_spec::DesiredSpec;

fn main() -> Result<(), serde_yaml::Error> {
    let schema = schemars::schema_for!(DesiredSpec);
    print!("{}", serde_yaml::to_string(&schema)?);
    Ok(())
}
