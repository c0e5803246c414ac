//! Localized text for every message the assistant produces on its own.
//!
//! A single [`Catalog`] is injected into the classifier, state machine and
//! formatter so that adding a language is a data change, not a code fork.

use std::collections::HashMap;

use crate::language::Language;

#[derive(Debug, Clone)]
pub struct LocaleStrings {
    pub welcome: &'static str,
    /// Language name as written into language-model prompts.
    pub prompt_language_name: &'static str,
    pub ask_origin: &'static str,
    /// `{origin}` is replaced by the confirmed origin country.
    pub ask_destination: &'static str,
    pub country_not_recognized: &'static str,
    /// Placeholders: `{origin}`, `{destination}`, `{from}`, `{to}`, `{rate}`.
    pub rate_result: &'static str,
    pub rate_error: &'static str,
    pub corridor_title: &'static str,
    pub corridor_footer: &'static str,
    pub corridor_error: &'static str,
    pub corridor_link_label: &'static str,
    pub order_title: &'static str,
    pub order_error: &'static str,
    pub rate_overview_title: &'static str,
    pub rate_overview_error: &'static str,
    pub no_data: &'static str,
    pub fallback_apology: &'static str,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    strings: HashMap<Language, LocaleStrings>,
}

impl Catalog {
    pub fn new(strings: HashMap<Language, LocaleStrings>) -> Self {
        Self { strings }
    }

    pub fn builtin() -> Self {
        let strings = Language::ALL
            .into_iter()
            .map(|language| (language, builtin_strings(language)))
            .collect();
        Self { strings }
    }

    /// Strings for `language`, English when the catalog has no entry for it.
    pub fn get(&self, language: Language) -> &LocaleStrings {
        self.strings
            .get(&language)
            .or_else(|| self.strings.get(&Language::En))
            .unwrap_or(&ENGLISH)
    }

    pub fn has(&self, language: Language) -> bool {
        self.strings.contains_key(&language)
    }

    pub fn ask_destination(&self, language: Language, origin: &str) -> String {
        self.get(language).ask_destination.replace("{origin}", origin)
    }

    pub fn rate_sentence(
        &self,
        language: Language,
        origin: &str,
        destination: &str,
        from_currency: &str,
        to_currency: &str,
        rate: &str,
    ) -> String {
        self.get(language)
            .rate_result
            .replace("{origin}", origin)
            .replace("{destination}", destination)
            .replace("{from}", from_currency)
            .replace("{to}", to_currency)
            .replace("{rate}", rate)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_strings(language: Language) -> LocaleStrings {
    match language {
        Language::Fr => FRENCH,
        Language::En => ENGLISH,
        Language::Es => SPANISH,
        Language::De => GERMAN,
        Language::Ar => ARABIC,
        Language::Pt => PORTUGUESE,
    }
}

const FRENCH: LocaleStrings = LocaleStrings {
    welcome: "👋 Bonjour ! Je suis Hakach, votre assistant virtuel.\n\nJe suis là pour vous accompagner dans tous vos transferts d'argent. N'hésitez pas à me poser vos questions sur nos services, nos tarifs ou le fonctionnement des transferts. Comment puis-je vous aider aujourd'hui ? 😊",
    prompt_language_name: "Français",
    ask_origin: "💱 Avec plaisir ! Depuis quel pays souhaitez-vous envoyer de l'argent ?",
    ask_destination: "Parfait, envoi depuis {origin}. Dans quel pays se trouve le destinataire ?",
    country_not_recognized: "😕 Je ne reconnais pas ce pays. Pouvez-vous vérifier l'orthographe et réessayer ?",
    rate_result: "💱 Taux de change {origin} → {destination} : 1 {from} = {rate} {to}",
    rate_error: "😔 Désolée, je n'ai pas pu récupérer le taux de change pour le moment. Veuillez réessayer plus tard.",
    corridor_title: "🌍 Voici nos corridors de transfert disponibles :",
    corridor_footer: "Besoin d'aide pour un envoi ? Je suis là ! ✨",
    corridor_error: "😔 Désolée, je n'ai pas pu récupérer la liste des corridors. Veuillez réessayer plus tard.",
    corridor_link_label: "Envoyer",
    order_title: "📦 Voici vos commandes :",
    order_error: "😔 Désolée, je n'ai pas pu récupérer vos commandes. Veuillez réessayer plus tard.",
    rate_overview_title: "💱 Nos taux de change actuels :",
    rate_overview_error: "😔 Désolée, je n'ai pas pu récupérer les taux de change. Veuillez réessayer plus tard.",
    no_data: "Aucune donnée disponible pour le moment.",
    fallback_apology: "😔 Désolée, j'ai rencontré un petit problème technique. Pouvez-vous reformuler votre question ? Je ferai de mon mieux pour vous aider. 🙏",
};

const ENGLISH: LocaleStrings = LocaleStrings {
    welcome: "👋 Hello! I am Hakach, your virtual assistant.\n\nI'm here to assist you with all your money transfers. Feel free to ask me any questions about our services, rates, or how transfers work. How can I help you today? 😊",
    prompt_language_name: "English",
    ask_origin: "💱 Happy to help! Which country are you sending money from?",
    ask_destination: "Great, sending from {origin}. Which country is the recipient in?",
    country_not_recognized: "😕 I don't recognize that country. Could you check the spelling and try again?",
    rate_result: "💱 Exchange rate {origin} → {destination}: 1 {from} = {rate} {to}",
    rate_error: "😔 Sorry, I couldn't retrieve the exchange rate right now. Please try again later.",
    corridor_title: "🌍 Here are our available transfer corridors:",
    corridor_footer: "Need help with a transfer? I'm here! ✨",
    corridor_error: "😔 Sorry, I couldn't retrieve the list of corridors. Please try again later.",
    corridor_link_label: "Send",
    order_title: "📦 Here are your orders:",
    order_error: "😔 Sorry, I couldn't retrieve your orders. Please try again later.",
    rate_overview_title: "💱 Our current exchange rates:",
    rate_overview_error: "😔 Sorry, I couldn't retrieve the exchange rates. Please try again later.",
    no_data: "No data available at the moment.",
    fallback_apology: "😔 I apologize, I encountered a technical issue. Could you rephrase your question? I'll do my best to help you. 🙏",
};

const SPANISH: LocaleStrings = LocaleStrings {
    welcome: "👋 ¡Hola! Soy Hakach, tu asistente virtual.\n\nEstoy aquí para ayudarte con todas tus transferencias de dinero. No dudes en preguntarme sobre nuestros servicios, tarifas o cómo funcionan las transferencias. ¿Cómo puedo ayudarte hoy? 😊",
    prompt_language_name: "Español",
    ask_origin: "💱 ¡Con gusto! ¿Desde qué país quieres enviar dinero?",
    ask_destination: "Perfecto, envío desde {origin}. ¿En qué país está el destinatario?",
    country_not_recognized: "😕 No reconozco ese país. ¿Puedes revisar la ortografía e intentarlo de nuevo?",
    rate_result: "💱 Tipo de cambio {origin} → {destination}: 1 {from} = {rate} {to}",
    rate_error: "😔 Lo siento, no pude obtener el tipo de cambio en este momento. Inténtalo más tarde.",
    corridor_title: "🌍 Estos son nuestros corredores de transferencia disponibles:",
    corridor_footer: "¿Necesitas ayuda con un envío? ¡Aquí estoy! ✨",
    corridor_error: "😔 Lo siento, no pude obtener la lista de corredores. Inténtalo más tarde.",
    corridor_link_label: "Enviar",
    order_title: "📦 Estos son tus pedidos:",
    order_error: "😔 Lo siento, no pude obtener tus pedidos. Inténtalo más tarde.",
    rate_overview_title: "💱 Nuestros tipos de cambio actuales:",
    rate_overview_error: "😔 Lo siento, no pude obtener los tipos de cambio. Inténtalo más tarde.",
    no_data: "No hay datos disponibles por el momento.",
    fallback_apology: "😔 Lo siento, encontré un problema técnico. ¿Podrías reformular tu pregunta? Haré mi mejor esfuerzo para ayudarte. 🙏",
};

const GERMAN: LocaleStrings = LocaleStrings {
    welcome: "👋 Hallo! Ich bin Hakach, Ihr virtueller Assistent.\n\nIch bin hier, um Sie bei allen Ihren Geldtransfers zu unterstützen. Fragen Sie mich gerne alles über unsere Dienste, Gebühren oder wie Überweisungen funktionieren. Wie kann ich Ihnen heute helfen? 😊",
    prompt_language_name: "Deutsch",
    ask_origin: "💱 Gerne! Aus welchem Land möchten Sie Geld senden?",
    ask_destination: "Sehr gut, Versand aus {origin}. In welchem Land befindet sich der Empfänger?",
    country_not_recognized: "😕 Dieses Land erkenne ich nicht. Könnten Sie die Schreibweise prüfen und es erneut versuchen?",
    rate_result: "💱 Wechselkurs {origin} → {destination}: 1 {from} = {rate} {to}",
    rate_error: "😔 Entschuldigung, ich konnte den Wechselkurs gerade nicht abrufen. Bitte versuchen Sie es später erneut.",
    corridor_title: "🌍 Hier sind unsere verfügbaren Überweisungskorridore:",
    corridor_footer: "Brauchen Sie Hilfe bei einer Überweisung? Ich bin für Sie da! ✨",
    corridor_error: "😔 Entschuldigung, ich konnte die Liste der Korridore nicht abrufen. Bitte versuchen Sie es später erneut.",
    corridor_link_label: "Senden",
    order_title: "📦 Hier sind Ihre Aufträge:",
    order_error: "😔 Entschuldigung, ich konnte Ihre Aufträge nicht abrufen. Bitte versuchen Sie es später erneut.",
    rate_overview_title: "💱 Unsere aktuellen Wechselkurse:",
    rate_overview_error: "😔 Entschuldigung, ich konnte die Wechselkurse nicht abrufen. Bitte versuchen Sie es später erneut.",
    no_data: "Derzeit sind keine Daten verfügbar.",
    fallback_apology: "😔 Entschuldigung, ich bin auf ein technisches Problem gestoßen. Könnten Sie Ihre Frage anders formulieren? Ich werde mein Bestes tun, um Ihnen zu helfen. 🙏",
};

const ARABIC: LocaleStrings = LocaleStrings {
    welcome: "👋 مرحباً! أنا هاكاش، مساعدك الافتراضي.\n\nأنا هنا لمساعدتك في جميع تحويلاتك المالية. لا تتردد في طرح أي أسئلة حول خدماتنا وأسعارنا أو كيفية عمل التحويلات. كيف يمكنني مساعدتك اليوم؟ 😊",
    prompt_language_name: "العربية",
    ask_origin: "💱 بكل سرور! من أي بلد تريد إرسال المال؟",
    ask_destination: "ممتاز، الإرسال من {origin}. في أي بلد يوجد المستلم؟",
    country_not_recognized: "😕 لم أتعرف على هذا البلد. هل يمكنك التحقق من الكتابة والمحاولة مرة أخرى؟",
    rate_result: "💱 سعر الصرف {origin} ← {destination}: 1 {from} = {rate} {to}",
    rate_error: "😔 عذراً، لم أتمكن من الحصول على سعر الصرف حالياً. يرجى المحاولة لاحقاً.",
    corridor_title: "🌍 إليك ممرات التحويل المتاحة لدينا:",
    corridor_footer: "هل تحتاج إلى مساعدة في التحويل؟ أنا هنا! ✨",
    corridor_error: "😔 عذراً، لم أتمكن من الحصول على قائمة الممرات. يرجى المحاولة لاحقاً.",
    corridor_link_label: "إرسال",
    order_title: "📦 إليك طلباتك:",
    order_error: "😔 عذراً، لم أتمكن من الحصول على طلباتك. يرجى المحاولة لاحقاً.",
    rate_overview_title: "💱 أسعار الصرف الحالية لدينا:",
    rate_overview_error: "😔 عذراً، لم أتمكن من الحصول على أسعار الصرف. يرجى المحاولة لاحقاً.",
    no_data: "لا توجد بيانات متاحة حالياً.",
    fallback_apology: "😔 عذراً، واجهت مشكلة تقنية. هل يمكنك إعادة صياغة سؤالك؟ سأبذل قصارى جهدي لمساعدتك. 🙏",
};

const PORTUGUESE: LocaleStrings = LocaleStrings {
    welcome: "👋 Olá! Eu sou o Hakach, o seu assistente virtual.\n\nEstou aqui para ajudar com todas as suas transferências de dinheiro. Pergunte-me o que quiser sobre os nossos serviços, tarifas ou como funcionam as transferências. Como posso ajudar hoje? 😊",
    prompt_language_name: "Português",
    ask_origin: "💱 Com prazer! De que país deseja enviar dinheiro?",
    ask_destination: "Perfeito, envio a partir de {origin}. Em que país está o destinatário?",
    country_not_recognized: "😕 Não reconheço esse país. Pode verificar a ortografia e tentar novamente?",
    rate_result: "💱 Taxa de câmbio {origin} → {destination}: 1 {from} = {rate} {to}",
    rate_error: "😔 Desculpe, não consegui obter a taxa de câmbio neste momento. Tente novamente mais tarde.",
    corridor_title: "🌍 Estes são os nossos corredores de transferência disponíveis:",
    corridor_footer: "Precisa de ajuda com um envio? Estou aqui! ✨",
    corridor_error: "😔 Desculpe, não consegui obter a lista de corredores. Tente novamente mais tarde.",
    corridor_link_label: "Enviar",
    order_title: "📦 Estas são as suas encomendas:",
    order_error: "😔 Desculpe, não consegui obter as suas encomendas. Tente novamente mais tarde.",
    rate_overview_title: "💱 As nossas taxas de câmbio atuais:",
    rate_overview_error: "😔 Desculpe, não consegui obter as taxas de câmbio. Tente novamente mais tarde.",
    no_data: "Nenhum dado disponível de momento.",
    fallback_apology: "😔 Desculpe, encontrei um problema técnico. Pode reformular a sua pergunta? Farei o meu melhor para ajudar. 🙏",
};
