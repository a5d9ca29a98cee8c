pub fn is_strand_ambiguous(a1: &str, a2: &str) -> bool {
    matches!((a1, a2), ("A", "T") | ("T", "A") | ("C", "G") | ("G", "C"))
}

pub fn is_snp_allele(a: &str) -> bool {
    matches!(a, "A" | "C" | "G" | "T")
}

pub fn complement(allele: &str) -> Option<String> {
    allele
        .chars()
        .map(|c| match c {
            'A' => Some('T'),
            'T' => Some('A'),
            'C' => Some('G'),
            'G' => Some('C'),
            _ => None,
        })
        .collect()
}

pub fn normalize_allele(allele: &str) -> String {
    allele.trim().to_ascii_uppercase()
}
