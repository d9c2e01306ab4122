pub fn render_schema() -> String {
	expand_includes(include_str!("../../../sql/init.sql"))
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"00_extensions.sql" => out.push_str(include_str!("../../../sql/00_extensions.sql")),
				"tables/001_raw_documents.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_raw_documents.sql")),
				"tables/002_candidate_members.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_candidate_members.sql")),
				"tables/003_master_agents.sql" =>
					out.push_str(include_str!("../../../sql/tables/003_master_agents.sql")),
				"tables/004_merge_runs.sql" =>
					out.push_str(include_str!("../../../sql/tables/004_merge_runs.sql")),
				"tables/005_merge_decisions.sql" =>
					out.push_str(include_str!("../../../sql/tables/005_merge_decisions.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}
