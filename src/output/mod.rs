//! Serializing a finished run: full dumps and differential SPARQL updates
//!
//! A differential update replaces every graph the run wrote to, except
//! preserved graphs, which only ever receive inserts. The matching delete
//! drops replaced graphs and removes from preserved graphs exactly the
//! statements this run generated.

use crate::graph::{escape_iri, GraphName, Statement, StatementSink};
use std::io::{self, Write};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    NQuads,
    NTriples,
    /// SPARQL Update replacing the generated graphs
    Update,
    /// SPARQL Update retracting the generated graphs
    Delete,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nquads" | "nq" => Ok(OutputFormat::NQuads),
            "ntriples" | "nt" => Ok(OutputFormat::NTriples),
            "update" => Ok(OutputFormat::Update),
            "delete" => Ok(OutputFormat::Delete),
            other => Err(format!("unknown output format {}", other)),
        }
    }
}

/// One step of a differential update
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Remove the whole graph
    Drop(GraphName),
    Insert(GraphName, Vec<Statement>),
    /// Remove exactly these statements
    Delete(GraphName, Vec<Statement>),
}

/// Replace non-preserved graphs, insert into preserved ones
pub fn update_plan(sink: &dyn StatementSink) -> Vec<Instruction> {
    let mut plan = Vec::new();
    for graph in sink.graphs() {
        let statements = sink.statements(&graph);
        if statements.is_empty() {
            continue;
        }
        if !sink.is_preserved(&graph) {
            plan.push(Instruction::Drop(graph.clone()));
        }
        plan.push(Instruction::Insert(graph, statements));
    }
    plan
}

/// Drop non-preserved graphs, delete generated statements from preserved ones
pub fn delete_plan(sink: &dyn StatementSink) -> Vec<Instruction> {
    let mut plan = Vec::new();
    for graph in sink.graphs() {
        let statements = sink.statements(&graph);
        if statements.is_empty() {
            continue;
        }
        if sink.is_preserved(&graph) {
            plan.push(Instruction::Delete(graph, statements));
        } else {
            plan.push(Instruction::Drop(graph));
        }
    }
    plan
}

fn write_data_block<W: Write>(out: &mut W, graph: &GraphName, statements: &[Statement]) -> io::Result<()> {
    let named = match graph {
        GraphName::Named(iri) => {
            writeln!(out, "GRAPH <{}> {{", escape_iri(iri))?;
            true
        }
        GraphName::Default => false,
    };
    for statement in statements {
        writeln!(out, "{}", statement.to_ntriples())?;
    }
    if named {
        writeln!(out, "}}")?;
    }
    Ok(())
}

/// Render instructions as SPARQL Update text
pub fn write_sparql_update<W: Write>(out: &mut W, plan: &[Instruction]) -> io::Result<()> {
    for instruction in plan {
        match instruction {
            Instruction::Drop(GraphName::Default) => writeln!(out, "DROP SILENT DEFAULT ;")?,
            Instruction::Drop(GraphName::Named(iri)) => writeln!(out, "DROP SILENT GRAPH <{}> ;", escape_iri(iri))?,
            Instruction::Insert(graph, statements) => {
                writeln!(out, "INSERT DATA {{")?;
                write_data_block(out, graph, statements)?;
                writeln!(out, "}};")?;
            }
            Instruction::Delete(graph, statements) => {
                writeln!(out, "DELETE DATA {{")?;
                write_data_block(out, graph, statements)?;
                writeln!(out, "}};")?;
            }
        }
    }
    Ok(())
}

pub fn write_nquads<W: Write>(out: &mut W, sink: &dyn StatementSink) -> io::Result<()> {
    for graph in sink.graphs() {
        for statement in sink.statements(&graph) {
            writeln!(out, "{}", statement.to_nquads(&graph))?;
        }
    }
    Ok(())
}

/// All graphs flattened into one triple stream
pub fn write_ntriples<W: Write>(out: &mut W, sink: &dyn StatementSink) -> io::Result<()> {
    for graph in sink.graphs() {
        for statement in sink.statements(&graph) {
            writeln!(out, "{}", statement.to_ntriples())?;
        }
    }
    Ok(())
}

/// Write the sink in the requested format
pub fn write_output<W: Write>(out: &mut W, sink: &dyn StatementSink, format: OutputFormat) -> io::Result<()> {
    match format {
        OutputFormat::NQuads => write_nquads(out, sink),
        OutputFormat::NTriples => write_ntriples(out, sink),
        OutputFormat::Update => write_sparql_update(out, &update_plan(sink)),
        OutputFormat::Delete => write_sparql_update(out, &delete_plan(sink)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Dataset, Literal, Term};

    fn statement(s: &str, o: &str) -> Statement {
        Statement::new(
            Term::iri(format!("http://x/{}", s)),
            Term::iri("http://x/p"),
            Literal::plain(o).into(),
        )
    }

    fn dataset() -> Dataset {
        let mut ds = Dataset::new();
        let kept = GraphName::named("http://x/graph/kept");
        let replaced = GraphName::named("http://x/graph/replaced");
        ds.add(&GraphName::Default, statement("a", "1"));
        ds.add(&kept, statement("b", "2"));
        ds.add(&replaced, statement("c", "3"));
        ds.preserve(&kept);
        ds
    }

    fn render(plan: &[Instruction]) -> String {
        let mut out = Vec::new();
        write_sparql_update(&mut out, plan).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn update_inserts_into_preserved_graphs_without_dropping() {
        let text = render(&update_plan(&dataset()));
        assert!(text.contains("DROP SILENT DEFAULT ;"));
        assert!(text.contains("DROP SILENT GRAPH <http://x/graph/replaced> ;"));
        assert!(!text.contains("DROP SILENT GRAPH <http://x/graph/kept>"));
        assert!(text.contains("INSERT DATA {\nGRAPH <http://x/graph/kept> {\n<http://x/b> <http://x/p> \"2\" .\n}\n};"));
    }

    #[test]
    fn delete_retracts_only_generated_statements_from_preserved_graphs() {
        let plan = delete_plan(&dataset());
        assert!(plan.contains(&Instruction::Drop(GraphName::named("http://x/graph/replaced"))));
        assert!(plan.contains(&Instruction::Delete(
            GraphName::named("http://x/graph/kept"),
            vec![statement("b", "2")]
        )));
        assert!(!plan.iter().any(|i| matches!(i, Instruction::Insert(..))));
        let text = render(&plan);
        assert!(text.contains("DELETE DATA {\nGRAPH <http://x/graph/kept> {"));
    }

    #[test]
    fn nquads_carry_graph_names() {
        let mut out = Vec::new();
        write_nquads(&mut out, &dataset()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("<http://x/a> <http://x/p> \"1\" .\n"));
        assert!(text.contains("<http://x/c> <http://x/p> \"3\" <http://x/graph/replaced> .\n"));
    }

    #[test]
    fn formats_parse_case_insensitively() {
        assert_eq!("Update".parse::<OutputFormat>(), Ok(OutputFormat::Update));
        assert_eq!("nt".parse::<OutputFormat>(), Ok(OutputFormat::NTriples));
        assert!("turtle".parse::<OutputFormat>().is_err());
    }
}
