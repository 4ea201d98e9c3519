/// Nodes sampled per document when inferring a document-level title.
pub const TITLE_SAMPLE_NODES: usize = 5;
/// Representative questions generated per node.
pub const QUESTIONS_PER_NODE: usize = 3;
/// Keyword cap per node.
pub const MAX_KEYWORDS_PER_NODE: usize = 15;
/// Bounded parallelism for summary extraction.
pub const SUMMARY_WORKERS: usize = 5;

/// Per-request extractor toggles from the ingestion API.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractorFlags {
    pub title: bool,
    pub qa: bool,
    pub keywords: bool,
    pub summary: bool,
}

/// One stage of the ingestion transformation chain. The chain is a closed
/// set: splitting always runs first, extractors follow in a fixed order
/// because later stages read metadata written by earlier ones (summary
/// extraction benefits from title context).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transformation {
    Split {
        chunk_size: usize,
        chunk_overlap: usize,
    },
    ExtractTitle {
        sample_nodes: usize,
    },
    ExtractQuestions {
        questions: usize,
    },
    ExtractKeywords {
        max_keywords: usize,
    },
    ExtractSummary {
        workers: usize,
    },
}

/// Ordered transformation chain assembled from request flags.
#[derive(Debug, Clone)]
pub struct TransformationPlan {
    stages: Vec<Transformation>,
}

impl TransformationPlan {
    pub fn from_flags(chunk_size: usize, chunk_overlap: usize, flags: ExtractorFlags) -> Self {
        let mut stages = vec![Transformation::Split {
            chunk_size,
            chunk_overlap,
        }];

        if flags.title {
            stages.push(Transformation::ExtractTitle {
                sample_nodes: TITLE_SAMPLE_NODES,
            });
        }
        if flags.qa {
            stages.push(Transformation::ExtractQuestions {
                questions: QUESTIONS_PER_NODE,
            });
        }
        if flags.keywords {
            stages.push(Transformation::ExtractKeywords {
                max_keywords: MAX_KEYWORDS_PER_NODE,
            });
        }
        if flags.summary {
            stages.push(Transformation::ExtractSummary {
                workers: SUMMARY_WORKERS,
            });
        }

        Self { stages }
    }

    pub fn stages(&self) -> &[Transformation] {
        &self.stages
    }

    /// Number of stages that call the LLM.
    pub fn extractor_count(&self) -> usize {
        self.stages
            .iter()
            .filter(|stage| !matches!(stage, Transformation::Split { .. }))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_is_always_first() {
        let plan = TransformationPlan::from_flags(512, 128, ExtractorFlags::default());
        assert_eq!(
            plan.stages(),
            &[Transformation::Split {
                chunk_size: 512,
                chunk_overlap: 128
            }]
        );
    }

    #[test]
    fn all_flags_produce_the_full_fixed_order() {
        let flags = ExtractorFlags {
            title: true,
            qa: true,
            keywords: true,
            summary: true,
        };
        let plan = TransformationPlan::from_flags(512, 128, flags);

        assert_eq!(
            plan.stages(),
            &[
                Transformation::Split {
                    chunk_size: 512,
                    chunk_overlap: 128
                },
                Transformation::ExtractTitle { sample_nodes: 5 },
                Transformation::ExtractQuestions { questions: 3 },
                Transformation::ExtractKeywords { max_keywords: 15 },
                Transformation::ExtractSummary { workers: 5 },
            ]
        );
        assert_eq!(plan.extractor_count(), 4);
    }

    #[test]
    fn order_is_fixed_regardless_of_flag_combination() {
        let flags = ExtractorFlags {
            title: false,
            qa: true,
            keywords: false,
            summary: true,
        };
        let plan = TransformationPlan::from_flags(256, 0, flags);

        assert_eq!(
            plan.stages(),
            &[
                Transformation::Split {
                    chunk_size: 256,
                    chunk_overlap: 0
                },
                Transformation::ExtractQuestions { questions: 3 },
                Transformation::ExtractSummary { workers: 5 },
            ]
        );
    }
}
