use colored::Colorize;
use lampstack_cloud::ResourceGraph;
use lampstack_core::Stack;

pub fn handle(stack: &Stack, waves: bool) -> anyhow::Result<()> {
    let template = lampstack_cloud::synthesize(stack)?;
    let graph = ResourceGraph::from_template(&template);

    if waves {
        for (i, wave) in graph.waves()?.iter().enumerate() {
            println!("{}", format!("Wave {}", i + 1).bold());
            for id in wave {
                print_node(&graph, id, "  ");
            }
        }
        return Ok(());
    }

    for (i, id) in graph.deployment_order()?.iter().enumerate() {
        print_node(&graph, id, &format!("{:>3}. ", i + 1));
    }
    Ok(())
}

fn print_node(graph: &ResourceGraph, id: &str, prefix: &str) {
    let Some(node) = graph.node(id) else {
        return;
    };
    println!(
        "{}{} {}",
        prefix,
        id.cyan(),
        format!("({})", node.resource_type).dimmed()
    );
    if !node.depends_on.is_empty() {
        let deps: Vec<&str> = node.depends_on.iter().map(String::as_str).collect();
        println!("{}    ← {}", " ".repeat(prefix.chars().count()), deps.join(", "));
    }
}
