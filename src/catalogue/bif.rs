//! Variable declarations from BIF (Bayesian Interchange Format) documents.
//!
//! Only the `variable` blocks are read; probability tables belong to the
//! inference engine and are ignored here.

use std::sync::OnceLock;

use regex::Regex;

use crate::catalogue::{ModelCatalogue, Variable};
use crate::error::CatalogueError;

static BLOCK_COMMENT: OnceLock<Regex> = OnceLock::new();
static LINE_COMMENT: OnceLock<Regex> = OnceLock::new();
static VARIABLE_KEYWORD: OnceLock<Regex> = OnceLock::new();
static DISCRETE_VARIABLE: OnceLock<Regex> = OnceLock::new();

fn compiled(cell: &'static OnceLock<Regex>, pattern: &str) -> Result<&'static Regex, CatalogueError> {
    if let Some(re) = cell.get() {
        return Ok(re);
    }
    let re = Regex::new(pattern).map_err(|e| CatalogueError::Malformed {
        reason: format!("invalid pattern '{pattern}': {e}"),
    })?;
    Ok(cell.get_or_init(|| re))
}

fn strip_comments(text: &str) -> Result<String, CatalogueError> {
    let block = compiled(&BLOCK_COMMENT, r"(?s)/\*.*?\*/")?;
    let line = compiled(&LINE_COMMENT, r"//[^\n]*")?;
    let without_blocks = block.replace_all(text, " ");
    Ok(line.replace_all(&without_blocks, "").into_owned())
}

/// Parses the discrete variables declared in a BIF document.
///
/// # Errors
/// - `Malformed` if a `variable` block is not a discrete declaration
/// - `StateCountMismatch` if the declared arity disagrees with the listed states
/// - any error from [`Variable::new`] or [`ModelCatalogue::new`]
pub fn parse_bif(name: &str, text: &str) -> Result<ModelCatalogue, CatalogueError> {
    let text = strip_comments(text)?;
    let keyword = compiled(&VARIABLE_KEYWORD, r"(?m)^\s*variable\s+")?;
    let discrete = compiled(
        &DISCRETE_VARIABLE,
        r"(?s)variable\s+([^\s{]+)\s*\{[^{}]*?type\s+discrete\s*\[\s*(\d+)\s*\]\s*\{([^}]*)\}\s*;",
    )?;

    let mut variables = Vec::new();
    for caps in discrete.captures_iter(&text) {
        let var_name = caps[1].to_string();
        let declared: usize = caps[2].parse().map_err(|e| CatalogueError::Malformed {
            reason: format!("variable '{var_name}': bad arity '{}': {e}", &caps[2]),
        })?;
        let states: Vec<String> = caps[3]
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect();

        if states.len() != declared {
            return Err(CatalogueError::StateCountMismatch {
                variable: var_name,
                declared,
                actual: states.len(),
            });
        }
        variables.push(Variable::new(var_name, states)?);
    }

    let declared_blocks = keyword.find_iter(&text).count();
    if declared_blocks != variables.len() {
        return Err(CatalogueError::Malformed {
            reason: format!(
                "{declared_blocks} variable blocks found but only {} are discrete declarations",
                variables.len()
            ),
        });
    }

    ModelCatalogue::new(name, variables)
}
