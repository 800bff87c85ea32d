//! Split a tileserver config into its `[[sources]]` blocks so it can be
//! re-rendered with only the first few sources enabled.

const SOURCES_HEADER: &str = "[[sources]]";

/// Source counts activated by successive reload stages
const STAGE_COUNTS: [usize; 3] = [1, 2, 3];

/// A config file broken into the text around its source blocks.
///
/// Lines keep their original line endings. Array tables that sit between
/// two source blocks are not kept: `render` only emits the prefix, the
/// selected blocks, and the suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedConfig {
    prefix: Vec<String>,
    blocks: Vec<Vec<String>>,
    suffix: Vec<String>,
}

impl StagedConfig {
    pub fn split(config_text: &str) -> Self {
        let lines: Vec<String> = config_text.split_inclusive('\n').map(String::from).collect();

        let section_indices: Vec<usize> = lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.trim().starts_with("[["))
            .map(|(idx, _)| idx)
            .collect();

        let source_indices: Vec<usize> = section_indices
            .iter()
            .copied()
            .filter(|&idx| lines[idx].trim() == SOURCES_HEADER)
            .collect();

        let (Some(&first), Some(&last)) = (source_indices.first(), source_indices.last()) else {
            return Self {
                prefix: lines,
                blocks: Vec::new(),
                suffix: Vec::new(),
            };
        };

        // A source block runs until the next array-table header of any kind
        let block_end = |start: usize| {
            section_indices
                .iter()
                .copied()
                .find(|&idx| idx > start)
                .unwrap_or(lines.len())
        };

        let blocks = source_indices
            .iter()
            .map(|&start| lines[start..block_end(start)].to_vec())
            .collect();

        Self {
            prefix: lines[..first].to_vec(),
            blocks,
            suffix: lines[block_end(last)..].to_vec(),
        }
    }

    pub fn source_count(&self) -> usize {
        self.blocks.len()
    }

    /// Render the config with only the first `count` source blocks
    pub fn render(&self, count: usize) -> String {
        self.prefix
            .iter()
            .chain(self.blocks.iter().take(count).flatten())
            .chain(self.suffix.iter())
            .map(String::as_str)
            .collect()
    }

    /// Source counts to step through, smallest first
    pub fn stages(&self) -> Vec<usize> {
        let available = self.source_count();
        let stages: Vec<usize> = STAGE_COUNTS
            .iter()
            .copied()
            .filter(|&count| count <= available)
            .collect();

        if stages.is_empty() {
            vec![available]
        } else {
            stages
        }
    }
}
